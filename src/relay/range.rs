use crate::error::RelayError;

/// Inclusive `[start, end]` window over a track's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    pub start: u64,
    pub end: u64,
}

impl ByteWindow {
    /// The whole track. `content_length` must be non-zero.
    pub fn full(content_length: u64) -> Self {
        Self {
            start: 0,
            end: content_length.saturating_sub(1),
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value: `bytes start-end/total`.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Parse a `Range` value against a known, non-zero content length.
///
/// Accepts `bytes=<start>-<end>`; the `bytes=` prefix is optional and only
/// the first comma-separated spec is read. A missing or unparseable start
/// means 0, a missing or unparseable end means the last byte.
pub fn resolve_range(header: &str, content_length: u64) -> Result<ByteWindow, RelayError> {
    let value = header.trim();
    let value = value.strip_prefix("bytes=").unwrap_or(value);
    let first = value.split(',').next().unwrap_or("");
    let mut parts = first.splitn(2, '-');
    let start = parts.next().and_then(leading_u64).unwrap_or(0);
    let end = parts
        .next()
        .and_then(leading_u64)
        .unwrap_or(content_length.saturating_sub(1));

    if start >= content_length || end >= content_length || start > end {
        return Err(RelayError::RangeNotSatisfiable { content_length });
    }
    Ok(ByteWindow { start, end })
}

/// Leading decimal digits after optional whitespace, as an integer.
/// Digit runs too large for `u64` saturate so they still fail the bounds check.
fn leading_u64(s: &str) -> Option<u64> {
    let s = s.trim_start();
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    Some(s[..digits].parse().unwrap_or(u64::MAX))
}
