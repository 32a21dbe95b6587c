use anyhow::Result;
use async_trait::async_trait;

use super::types::{HomeSection, Song, UpNext};

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Song>>;
    async fn home_sections(&self) -> Result<Vec<HomeSection>>;
    async fn playlist(&self, playlist_id: &str) -> Result<Vec<Song>>;
    async fn up_next(&self, video_id: &str) -> Result<Vec<UpNext>>;
}
