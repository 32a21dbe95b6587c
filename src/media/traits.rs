use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use super::types::{MediaId, ResolvedFormat};

/// Byte stream of a track's audio. Dropping it must stop the underlying transfer.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Look up the best audio-only format. `Ok(None)` when the track has none.
    async fn resolve(&self, id: &MediaId) -> Result<Option<ResolvedFormat>>;

    /// Open a decode stream for the whole track in the given format, from byte 0.
    async fn open_stream(&self, id: &MediaId, format: &ResolvedFormat) -> Result<ByteStream>;
}
