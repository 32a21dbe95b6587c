// Trending list: home-feed aggregation plus a TTL memo with single-flight refresh.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures_util::future::join_all;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::traits::MetadataProvider;
use super::types::{SectionItem, Song};
use crate::config::{TRENDING_PLAYLIST_TAKE, UNSUPPORTED_PLAYLIST_PREFIXES};

/// Flatten the home feed into songs. Playlist shelves are expanded concurrently,
/// keeping the first few songs of each; a playlist that fails to load is skipped.
pub async fn collect_trending(provider: &dyn MetadataProvider) -> Result<Vec<Song>> {
    let sections = provider.home_sections().await?;

    let mut songs = Vec::new();
    let mut playlist_ids = Vec::new();
    for section in sections {
        for item in section.items {
            match item {
                SectionItem::Song(song) => songs.push(song),
                SectionItem::Playlist { playlist_id } => {
                    if UNSUPPORTED_PLAYLIST_PREFIXES
                        .iter()
                        .any(|p| playlist_id.starts_with(p))
                    {
                        warn!("skipping unsupported playlist {}", playlist_id);
                        continue;
                    }
                    playlist_ids.push(playlist_id);
                }
            }
        }
    }

    let fetches = playlist_ids.iter().map(|id| async move {
        let result = provider.playlist(id).await;
        (id, result)
    });
    for (id, result) in join_all(fetches).await {
        match result {
            Ok(list) => songs.extend(list.into_iter().take(TRENDING_PLAYLIST_TAKE)),
            Err(e) => warn!("skipping playlist {}: {:#}", id, e),
        }
    }

    Ok(songs)
}

struct CachedSongs {
    at: Instant,
    songs: Arc<Vec<Song>>,
}

pub struct TrendingCache {
    ttl: Duration,
    entry: RwLock<Option<CachedSongs>>,
    refresh_lock: Mutex<()>,
}

impl TrendingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    fn fresh(&self) -> Option<Arc<Vec<Song>>> {
        let entry = self.entry.read();
        entry
            .as_ref()
            .filter(|cached| cached.at.elapsed() < self.ttl)
            .map(|cached| cached.songs.clone())
    }

    /// Return the memoized list, rebuilding it when stale. Concurrent callers
    /// share one rebuild. A failed rebuild leaves the previous value in place.
    pub async fn get_or_refresh(&self, provider: &dyn MetadataProvider) -> Result<Arc<Vec<Song>>> {
        if let Some(songs) = self.fresh() {
            return Ok(songs);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(songs) = self.fresh() {
            debug!("trending refreshed by a concurrent caller");
            return Ok(songs);
        }

        let t0 = Instant::now();
        let songs = Arc::new(collect_trending(provider).await?);
        *self.entry.write() = Some(CachedSongs {
            at: Instant::now(),
            songs: songs.clone(),
        });
        info!(
            "trending refreshed songs={} elapsed_ms={}",
            songs.len(),
            t0.elapsed().as_millis()
        );
        Ok(songs)
    }

    pub fn invalidate(&self) {
        *self.entry.write() = None;
    }
}
