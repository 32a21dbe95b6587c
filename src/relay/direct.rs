// Direct-fetch path: re-issue the requested range against the resolved media URL.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures_util::StreamExt;
use reqwest::{header, Client, StatusCode};
use tracing::{debug, warn};

use super::range::ByteWindow;
use crate::config::UPSTREAM_USER_AGENT;
use crate::media::traits::ByteStream;

pub struct DirectFetcher {
    client: Client,
    timeout: Duration,
}

impl DirectFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(UPSTREAM_USER_AGENT)
            .build()
            .context("build direct fetch client")?;
        Ok(Self { client, timeout })
    }

    /// Request `window` from `url`. Succeeds only on `206 Partial Content` whose
    /// `Content-Range` starts at `window.start`.
    ///
    /// The returned stream is the raw upstream body; callers cap it to the window length.
    pub async fn fetch_range(&self, url: &str, window: ByteWindow) -> Result<ByteStream> {
        let range = format!("bytes={}-{}", window.start, window.end);
        let request = self
            .client
            .get(url)
            .header(header::RANGE, range.as_str())
            .send();

        let resp = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| anyhow!("direct fetch timed out after {}s", self.timeout.as_secs()))?
            .context("direct fetch request")?;

        let status = resp.status();
        if status != StatusCode::PARTIAL_CONTENT {
            warn!(
                "direct fetch rejected status={} range={}",
                status.as_u16(),
                range
            );
            return Err(anyhow!("direct fetch failed: HTTP {}", status.as_u16()));
        }

        let served_start = resp
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_start);
        if served_start != Some(window.start) {
            warn!(
                "direct fetch window mismatch range={} served_start={:?}",
                range, served_start
            );
            return Err(anyhow!(
                "direct fetch served a different window (start {:?}, wanted {})",
                served_start,
                window.start
            ));
        }

        debug!(
            "direct fetch ok range={} upstream_len={:?}",
            range,
            resp.content_length()
        );
        Ok(Box::pin(
            resp.bytes_stream().map(|chunk| chunk.map_err(anyhow::Error::from)),
        ))
    }
}

/// First byte position of a `Content-Range: bytes start-end/total` value.
fn content_range_start(value: &str) -> Option<u64> {
    let spec = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = spec.split_once('-')?;
    start.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_range_start() {
        assert_eq!(content_range_start("bytes 500000-599999/1000000"), Some(500_000));
        assert_eq!(content_range_start("bytes 0-0/*"), Some(0));
        assert_eq!(content_range_start("bytes */1000"), None);
        assert_eq!(content_range_start("items 0-9/10"), None);
        assert_eq!(content_range_start(""), None);
    }
}
