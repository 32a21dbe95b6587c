use std::fmt;

use crate::error::RelayError;

const VIDEO_ID_LEN: usize = 11;

/// Opaque identifier of a playable track in the resolution service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaId(String);

impl MediaId {
    /// Validate a raw query value. Only the 11-character video id shape is accepted.
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        let raw = raw.trim();
        let valid = raw.len() == VIDEO_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(RelayError::InvalidId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch page URL handed to the resolver.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the resolver knows about the chosen audio format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFormat {
    /// Direct media URL supporting ranged GETs, if the resolver exposed one.
    pub url: Option<String>,
    pub mime_type: Option<String>,
    /// Total size in bytes; 0 when unknown.
    pub content_length: u64,
    /// Resolver-side format selector used to open a decode stream.
    pub format_id: Option<String>,
}

impl ResolvedFormat {
    pub fn is_decodable(&self) -> bool {
        self.format_id.is_some()
    }

    pub fn is_playable(&self) -> bool {
        self.url.is_some() || self.is_decodable()
    }
}
