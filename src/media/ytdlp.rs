// yt-dlp backed resolver: format lookup via `-J`, decode streams via `-o -`.

use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context as TaskContext, Poll};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use reqwest::Url;
use serde::Deserialize;
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::traits::{ByteStream, MediaResolver};
use super::types::{MediaId, ResolvedFormat};
use crate::config::DECODE_READ_CAPACITY;

/// stderr marker yt-dlp prints when `bestaudio` matches nothing.
const FORMAT_UNAVAILABLE: &str = "Requested format is not available";

/// The subset of `yt-dlp -J` output describing the selected format.
#[derive(Debug, Default, Deserialize)]
struct YtDlpInfo {
    format_id: Option<String>,
    url: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
    filesize: Option<u64>,
}

pub struct YtDlpResolver {
    binary: String,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Check whether the configured binary runs.
    pub async fn is_available(&self) -> bool {
        match Command::new(&self.binary).arg("--version").output().await {
            Ok(out) if out.status.success() => {
                info!(
                    "yt-dlp available: {} {}",
                    self.binary,
                    String::from_utf8_lossy(&out.stdout).trim()
                );
                true
            }
            Ok(out) => {
                warn!("yt-dlp --version exited with {}", out.status);
                false
            }
            Err(e) => {
                warn!("yt-dlp not runnable at {}: {}", self.binary, e);
                false
            }
        }
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, id: &MediaId) -> Result<Option<ResolvedFormat>> {
        let watch_url = id.watch_url();
        let output = Command::new(&self.binary)
            .args([
                "-J",
                "-f",
                "bestaudio",
                "--no-playlist",
                "--no-warnings",
                watch_url.as_str(),
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains(FORMAT_UNAVAILABLE) {
                debug!("no audio format for {}", id);
                return Ok(None);
            }
            return Err(anyhow!("yt-dlp failed: {}", stderr.trim()));
        }

        let info: YtDlpInfo =
            serde_json::from_slice(&output.stdout).context("parse yt-dlp json")?;
        let format = format_from_info(info);
        if let Some(f) = &format {
            debug!(
                "resolved {} format={:?} mime={:?} len={} direct={}",
                id,
                f.format_id,
                f.mime_type,
                f.content_length,
                f.url.is_some()
            );
        }
        Ok(format)
    }

    async fn open_stream(&self, id: &MediaId, format: &ResolvedFormat) -> Result<ByteStream> {
        let format_id = format
            .format_id
            .as_deref()
            .ok_or_else(|| anyhow!("format for {} has no decode selector", id))?;
        let watch_url = id.watch_url();

        let mut child = Command::new(&self.binary)
            .args([
                "-f",
                format_id,
                "-o",
                "-",
                "--quiet",
                "--no-warnings",
                "--no-part",
                watch_url.as_str(),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.binary))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("yt-dlp stdout not captured"))?;

        debug!("decode stream opened for {} format={}", id, format_id);
        Ok(Box::pin(ChildStream {
            _child: child,
            reader: ReaderStream::with_capacity(stdout, DECODE_READ_CAPACITY),
        }))
    }
}

/// Couples the child's lifetime to its stdout stream; dropping kills the process.
struct ChildStream {
    _child: Child,
    reader: ReaderStream<ChildStdout>,
}

impl Stream for ChildStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.reader)
            .poll_next(cx)
            .map(|item| item.map(|chunk| chunk.map_err(anyhow::Error::from)))
    }
}

fn format_from_info(info: YtDlpInfo) -> Option<ResolvedFormat> {
    if info.url.is_none() && info.format_id.is_none() {
        return None;
    }
    let content_length = info
        .filesize
        .or_else(|| info.url.as_deref().and_then(clen_from_url))
        .unwrap_or(0);
    Some(ResolvedFormat {
        mime_type: mime_for(info.ext.as_deref(), info.acodec.as_deref()),
        url: info.url,
        content_length,
        format_id: info.format_id,
    })
}

/// Media hosts encode the exact byte length as a `clen` query parameter.
fn clen_from_url(url: &str) -> Option<u64> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "clen")
        .and_then(|(_, v)| v.parse().ok())
}

fn mime_for(ext: Option<&str>, acodec: Option<&str>) -> Option<String> {
    let codec = acodec.filter(|c| !c.is_empty() && *c != "none");
    let base = match ext? {
        "webm" | "weba" => "audio/webm",
        "m4a" | "mp4" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "ogg" | "opus" => "audio/ogg",
        _ => return None,
    };
    Some(match codec {
        Some(c) => format!("{}; codecs=\"{}\"", base, c),
        None => base.to_string(),
    })
}
