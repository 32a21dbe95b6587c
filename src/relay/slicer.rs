// Window slicing over an upstream byte stream, and the pump task that feeds response bodies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::range::ByteWindow;
use super::stats::RelayStats;
use crate::config::RELAY_CHANNEL_DEPTH;
use crate::media::traits::ByteStream;

/// Tracks how much of the upstream has been skipped and emitted against a target window.
#[derive(Debug, Clone)]
pub struct WindowSlicer {
    start: u64,
    limit: Option<u64>,
    skipped: u64,
    emitted: u64,
}

impl WindowSlicer {
    pub fn new(window: ByteWindow) -> Self {
        Self {
            start: window.start,
            limit: Some(window.len()),
            skipped: 0,
            emitted: 0,
        }
    }

    /// Pass everything through; used when the total length is unknown.
    pub fn unbounded() -> Self {
        Self {
            start: 0,
            limit: None,
            skipped: 0,
            emitted: 0,
        }
    }

    /// Feed the next upstream chunk, returning the part that falls inside the window.
    pub fn push(&mut self, mut chunk: Bytes) -> Option<Bytes> {
        if self.is_complete() {
            return None;
        }

        if self.skipped < self.start {
            let skip = (self.start - self.skipped).min(chunk.len() as u64);
            self.skipped += skip;
            if skip == chunk.len() as u64 {
                return None;
            }
            chunk = chunk.slice(skip as usize..);
        }

        if let Some(remaining) = self.remaining() {
            if chunk.len() as u64 > remaining {
                chunk.truncate(remaining as usize);
            }
        }

        if chunk.is_empty() {
            return None;
        }
        self.emitted += chunk.len() as u64;
        Some(chunk)
    }

    pub fn is_complete(&self) -> bool {
        self.limit.is_some_and(|limit| self.emitted >= limit)
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Bytes still owed to the window, `None` when unbounded.
    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.emitted))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PumpEnd {
    WindowSatisfied,
    UpstreamEnded,
    ClientGone,
    Failed,
}

/// Relay `upstream` through `slicer` into a new stream.
///
/// A spawned task pulls upstream chunks and forwards the in-window bytes over a
/// bounded channel. The upstream is dropped as soon as the window is satisfied,
/// the receiver goes away, or an error occurs, so no transfer outlives its response.
pub fn relay_stream(
    upstream: ByteStream,
    slicer: WindowSlicer,
    idle_timeout: Duration,
    stats: Arc<RelayStats>,
) -> ByteStream {
    let (tx, rx) = mpsc::channel::<Result<Bytes>>(RELAY_CHANNEL_DEPTH);
    stats.stream_started();

    tokio::spawn(async move {
        let t0 = Instant::now();
        let mut upstream = upstream;
        let mut slicer = slicer;
        let end = pump(&mut upstream, &mut slicer, idle_timeout, &tx, &stats).await;

        stats.stream_finished();
        // Stops the decode process / upstream connection before the body closes.
        drop(upstream);

        debug!(
            "relay stream finished end={:?} bytes={} elapsed_ms={}",
            end,
            slicer.emitted(),
            t0.elapsed().as_millis()
        );
    });

    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}

async fn pump(
    upstream: &mut ByteStream,
    slicer: &mut WindowSlicer,
    idle_timeout: Duration,
    tx: &mpsc::Sender<Result<Bytes>>,
    stats: &RelayStats,
) -> PumpEnd {
    while !slicer.is_complete() {
        let next = tokio::select! {
            _ = tx.closed() => {
                debug!("relay receiver dropped after {} bytes", slicer.emitted());
                return PumpEnd::ClientGone;
            }
            next = tokio::time::timeout(idle_timeout, upstream.next()) => next,
        };

        let chunk = match next {
            Err(_) => {
                warn!("upstream stalled for {}s, aborting relay", idle_timeout.as_secs());
                let _ = tx
                    .send(Err(anyhow!(
                        "upstream stalled for {}s",
                        idle_timeout.as_secs()
                    )))
                    .await;
                return PumpEnd::Failed;
            }
            Ok(None) => {
                return match slicer.remaining() {
                    Some(short) if short > 0 => {
                        warn!("upstream ended {} bytes short of the window", short);
                        let _ = tx
                            .send(Err(anyhow!("upstream ended {} bytes early", short)))
                            .await;
                        PumpEnd::Failed
                    }
                    _ => PumpEnd::UpstreamEnded,
                };
            }
            Ok(Some(Err(e))) => {
                warn!("upstream stream error: {:#}", e);
                let _ = tx.send(Err(e)).await;
                return PumpEnd::Failed;
            }
            Ok(Some(Ok(chunk))) => chunk,
        };

        if let Some(out) = slicer.push(chunk) {
            let len = out.len() as u64;
            if tx.send(Ok(out)).await.is_err() {
                debug!("relay receiver dropped mid-send");
                return PumpEnd::ClientGone;
            }
            stats.record_relayed(len);
        }
    }
    PumpEnd::WindowSatisfied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn track(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    /// Split `data` into chunks with sizes from a small deterministic LCG.
    fn chunked(data: &[u8], seed: u64, max_chunk: u64) -> Vec<Bytes> {
        let mut state = seed;
        let mut out = Vec::new();
        let mut offset = 0usize;
        while offset < data.len() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let size = ((state >> 33) % max_chunk) as usize;
            let end = (offset + size).min(data.len());
            out.push(Bytes::copy_from_slice(&data[offset..end]));
            offset = end;
        }
        out
    }

    fn slice_all(chunks: Vec<Bytes>, window: ByteWindow) -> Vec<u8> {
        let mut slicer = WindowSlicer::new(window);
        let mut out = Vec::new();
        for chunk in chunks {
            if let Some(part) = slicer.push(chunk) {
                out.extend_from_slice(&part);
            }
        }
        out
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Yields `chunks`, then never completes. Sets `flag` when dropped.
    fn endless_upstream(chunks: Vec<Bytes>, flag: Arc<AtomicBool>) -> ByteStream {
        let guard = DropFlag(flag);
        Box::pin(
            stream::iter(chunks.into_iter().map(Ok::<Bytes, anyhow::Error>))
                .chain(stream::pending())
                .map(move |item| {
                    let _held = &guard;
                    item
                }),
        )
    }

    #[test]
    fn test_slicer_is_chunking_invariant() {
        let data = track(10_000);
        let windows = [
            ByteWindow { start: 0, end: 9_999 },
            ByteWindow { start: 0, end: 0 },
            ByteWindow { start: 1234, end: 5678 },
            ByteWindow { start: 9_999, end: 9_999 },
            ByteWindow { start: 4096, end: 8191 },
        ];
        for window in windows {
            let expected = &data[window.start as usize..=window.end as usize];
            for (seed, max_chunk) in [(1u64, 3u64), (7, 64), (42, 1500), (99, 20_000)] {
                let got = slice_all(chunked(&data, seed, max_chunk), window);
                assert_eq!(got.len() as u64, window.len());
                assert_eq!(&got[..], expected, "window {:?} seed {}", window, seed);
            }
        }
    }

    #[test]
    fn test_slicer_ignores_bytes_after_completion() {
        let mut slicer = WindowSlicer::new(ByteWindow { start: 2, end: 4 });
        assert_eq!(slicer.push(Bytes::from_static(b"ab")), None);
        assert_eq!(slicer.push(Bytes::from_static(b"cdefg")).unwrap(), &b"cde"[..]);
        assert!(slicer.is_complete());
        assert_eq!(slicer.push(Bytes::from_static(b"hij")), None);
        assert_eq!(slicer.emitted(), 3);
        assert_eq!(slicer.remaining(), Some(0));
    }

    #[test]
    fn test_unbounded_slicer_passes_everything() {
        let mut slicer = WindowSlicer::unbounded();
        assert_eq!(slicer.push(Bytes::from_static(b"abc")).unwrap(), &b"abc"[..]);
        assert_eq!(slicer.push(Bytes::new()), None);
        assert!(!slicer.is_complete());
        assert_eq!(slicer.remaining(), None);
    }

    #[tokio::test]
    async fn test_relay_stream_stops_upstream_once_window_served() {
        let data = track(50_000);
        let dropped = Arc::new(AtomicBool::new(false));
        let upstream = endless_upstream(chunked(&data, 5, 4096), dropped.clone());
        let stats = Arc::new(RelayStats::new());
        let window = ByteWindow { start: 10_000, end: 19_999 };

        let body = relay_stream(
            upstream,
            WindowSlicer::new(window),
            Duration::from_secs(5),
            stats.clone(),
        );
        let parts: Vec<Result<Bytes>> = body.collect().await;
        let mut out = Vec::new();
        for part in parts {
            out.extend_from_slice(&part.unwrap());
        }

        assert_eq!(out, &data[10_000..20_000]);
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(stats.snapshot().relayed_bytes, 10_000);
        assert_eq!(stats.snapshot().active_streams, 0);
    }

    #[tokio::test]
    async fn test_relay_stream_reports_short_upstream() {
        let upstream: ByteStream = Box::pin(stream::iter(vec![Ok::<Bytes, anyhow::Error>(
            Bytes::from_static(b"0123"),
        )]));
        let body = relay_stream(
            upstream,
            WindowSlicer::new(ByteWindow { start: 0, end: 9 }),
            Duration::from_secs(5),
            Arc::new(RelayStats::new()),
        );
        let parts: Vec<Result<Bytes>> = body.collect().await;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].as_ref().unwrap(), &b"0123"[..]);
        assert!(parts[1].is_err());
    }

    #[tokio::test]
    async fn test_relay_stream_idle_timeout() {
        let upstream: ByteStream = Box::pin(stream::pending::<Result<Bytes>>());
        let mut body = relay_stream(
            upstream,
            WindowSlicer::unbounded(),
            Duration::from_millis(50),
            Arc::new(RelayStats::new()),
        );
        let first = body.next().await.unwrap();
        assert!(first.is_err());
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_body_terminates_upstream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let upstream = endless_upstream(vec![Bytes::from_static(b"hello")], dropped.clone());
        let stats = Arc::new(RelayStats::new());
        let mut body = relay_stream(
            upstream,
            WindowSlicer::unbounded(),
            Duration::from_secs(30),
            stats.clone(),
        );

        assert_eq!(body.next().await.unwrap().unwrap(), &b"hello"[..]);
        drop(body);

        for _ in 0..100 {
            if dropped.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(stats.snapshot().active_streams, 0);
    }
}
