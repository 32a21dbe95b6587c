// Audio relay orchestration: resolve, pick a path, and shape the response.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::direct::DirectFetcher;
use super::range::{resolve_range, ByteWindow};
use super::slicer::{relay_stream, WindowSlicer};
use super::stats::RelayStats;
use crate::config::{RelayConfig, DEFAULT_MIME_TYPE};
use crate::error::RelayError;
use crate::media::traits::{ByteStream, MediaResolver};
use crate::media::types::{MediaId, ResolvedFormat};

/// Which strategy produced the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPath {
    DirectFetch,
    LocalSlice,
}

pub struct RelayResponse {
    /// Served window and total size when the request carried a satisfiable range.
    pub window: Option<(ByteWindow, u64)>,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub path: RelayPath,
    pub body: ByteStream,
}

impl RelayResponse {
    pub fn is_partial(&self) -> bool {
        self.window.is_some()
    }
}

pub struct AudioRelay {
    resolver: Arc<dyn MediaResolver>,
    direct: DirectFetcher,
    stats: Arc<RelayStats>,
    resolve_timeout: Duration,
    idle_timeout: Duration,
}

impl AudioRelay {
    pub fn new(resolver: Arc<dyn MediaResolver>, config: &RelayConfig) -> anyhow::Result<Self> {
        Ok(Self {
            resolver,
            direct: DirectFetcher::new(config.fetch_timeout())?,
            stats: Arc::new(RelayStats::new()),
            resolve_timeout: config.resolve_timeout(),
            idle_timeout: config.stream_idle_timeout(),
        })
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Serve the audio of `raw_id`, honouring an optional `Range` header value.
    pub async fn serve(
        &self,
        raw_id: Option<&str>,
        range_header: Option<&str>,
    ) -> Result<RelayResponse, RelayError> {
        self.stats.record_request();

        let raw_id = raw_id.filter(|s| !s.is_empty()).ok_or(RelayError::MissingId)?;
        let id = MediaId::parse(raw_id)?;

        let format = tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(&id))
            .await
            .map_err(|_| RelayError::UpstreamTimeout("resolve"))??
            .filter(ResolvedFormat::is_playable)
            .ok_or(RelayError::NotFound)?;

        let total = format.content_length;
        let window = match range_header {
            Some(h) if total > 0 => Some(resolve_range(h, total)?),
            _ => None,
        };
        let content_type = format
            .mime_type
            .clone()
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        debug!(
            "audio request id={} total={} window={:?} direct={}",
            id,
            total,
            window,
            format.url.is_some()
        );

        if let (Some(window), Some(url)) = (window, format.url.as_deref()) {
            match self.direct.fetch_range(url, window).await {
                Ok(upstream) => {
                    self.stats.record_direct_fetch();
                    let body = relay_stream(
                        upstream,
                        WindowSlicer::new(ByteWindow::full(window.len())),
                        self.idle_timeout,
                        self.stats.clone(),
                    );
                    return Ok(RelayResponse {
                        window: Some((window, total)),
                        content_type,
                        content_length: Some(window.len()),
                        path: RelayPath::DirectFetch,
                        body,
                    });
                }
                Err(e) => {
                    self.stats.record_fallback();
                    warn!(
                        "direct fetch failed for {} range={}-{}, falling back to local slice: {:#}",
                        id, window.start, window.end, e
                    );
                }
            }
        }

        if !format.is_decodable() {
            return Err(RelayError::Internal(anyhow::anyhow!(
                "No decodable stream for format"
            )));
        }

        let upstream = tokio::time::timeout(
            self.resolve_timeout,
            self.resolver.open_stream(&id, &format),
        )
        .await
        .map_err(|_| RelayError::UpstreamTimeout("decode stream start"))??;
        self.stats.record_local_slice();

        let (slicer, content_length) = match window {
            Some(w) => (WindowSlicer::new(w), Some(w.len())),
            None if total > 0 => (WindowSlicer::new(ByteWindow::full(total)), Some(total)),
            None => (WindowSlicer::unbounded(), None),
        };
        let body = relay_stream(upstream, slicer, self.idle_timeout, self.stats.clone());

        Ok(RelayResponse {
            window: window.map(|w| (w, total)),
            content_type,
            content_length,
            path: RelayPath::LocalSlice,
            body,
        })
    }
}
