use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// MIME type reported when the resolver does not supply one.
pub const DEFAULT_MIME_TYPE: &str = "audio/webm";

/// User agent presented to the media host on direct ranged fetches.
pub const UPSTREAM_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Buffered chunks between the upstream pump task and the response body.
pub const RELAY_CHANNEL_DEPTH: usize = 8;

/// Read buffer for the decode stream pulled from the resolver process (64 KB).
pub const DECODE_READ_CAPACITY: usize = 64 * 1024;

/// Songs taken from each playlist shelf when building the trending list.
pub const TRENDING_PLAYLIST_TAKE: usize = 10;

/// Playlist id prefixes the catalog cannot expand (radio mixes, album stubs).
pub const UNSUPPORTED_PLAYLIST_PREFIXES: [&str; 2] = ["RD", "OL"];

/// Default tracing filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Top-level configuration for the relay service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,
    /// Path or name of the yt-dlp executable.
    pub ytdlp_path: String,
    /// Deadline for a resolver call (format lookup or decode stream start).
    pub resolve_timeout_secs: u64,
    /// Deadline for the direct ranged fetch to return response headers.
    pub fetch_timeout_secs: u64,
    /// Longest gap tolerated between two upstream chunks mid-relay.
    pub stream_idle_timeout_secs: u64,
    /// Lifetime of the memoized trending list.
    pub trending_ttl_secs: u64,
    /// Tracing filter directive.
    pub log_filter: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
            resolve_timeout_secs: 30,
            fetch_timeout_secs: 15,
            stream_idle_timeout_secs: 30,
            trending_ttl_secs: 10 * 60,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl RelayConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }

    pub fn trending_ttl(&self) -> Duration {
        Duration::from_secs(self.trending_ttl_secs)
    }
}
