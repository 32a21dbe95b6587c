// Shared fakes for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use bytes::Bytes;
use futures_util::stream;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use tunestream::catalog::traits::MetadataProvider;
use tunestream::catalog::trending::TrendingCache;
use tunestream::catalog::types::{HomeSection, Song, UpNext};
use tunestream::config::RelayConfig;
use tunestream::media::traits::{ByteStream, MediaResolver};
use tunestream::media::types::{MediaId, ResolvedFormat};
use tunestream::relay::audio::AudioRelay;
use tunestream::server::handler::{AppServer, AppState};

pub const VIDEO_ID: &str = "dQw4w9WgXcQ";

/// Deterministic track bytes.
pub fn generate_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub enum ResolveOutcome {
    Found(ResolvedFormat),
    NoFormat,
    Fails(&'static str),
    Hangs,
}

/// Resolver serving `content` from memory in fixed-size chunks.
pub struct FakeResolver {
    pub outcome: ResolveOutcome,
    pub content: Arc<Vec<u8>>,
    pub chunk_size: usize,
    pub resolves: AtomicUsize,
    pub opens: AtomicUsize,
}

impl FakeResolver {
    pub fn new(outcome: ResolveOutcome, content: Vec<u8>) -> Self {
        Self {
            outcome,
            content: Arc::new(content),
            chunk_size: 7919,
            resolves: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MediaResolver for FakeResolver {
    async fn resolve(&self, _id: &MediaId) -> Result<Option<ResolvedFormat>> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            ResolveOutcome::Found(format) => Ok(Some(format.clone())),
            ResolveOutcome::NoFormat => Ok(None),
            ResolveOutcome::Fails(msg) => Err(anyhow!(*msg)),
            ResolveOutcome::Hangs => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(None)
            }
        }
    }

    async fn open_stream(&self, _id: &MediaId, _format: &ResolvedFormat) -> Result<ByteStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let chunks: Vec<Result<Bytes>> = self
            .content
            .chunks(self.chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// Catalog returning canned data and counting calls.
#[derive(Default)]
pub struct FakeCatalog {
    pub sections: Vec<HomeSection>,
    pub playlists: Mutex<Vec<(String, Vec<Song>)>>,
    pub fail_search: bool,
    pub fail_home: AtomicBool,
    pub home_delay: Option<Duration>,
    pub home_calls: AtomicUsize,
    pub playlist_calls: AtomicUsize,
}

#[async_trait]
impl MetadataProvider for FakeCatalog {
    async fn search(&self, query: &str) -> Result<Vec<Song>> {
        if self.fail_search {
            return Err(anyhow!("search backend down"));
        }
        Ok(vec![song(VIDEO_ID, query)])
    }

    async fn home_sections(&self) -> Result<Vec<HomeSection>> {
        self.home_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_home.load(Ordering::SeqCst) {
            return Err(anyhow!("home feed unavailable"));
        }
        if let Some(delay) = self.home_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.sections.clone())
    }

    async fn playlist(&self, playlist_id: &str) -> Result<Vec<Song>> {
        self.playlist_calls.fetch_add(1, Ordering::SeqCst);
        self.playlists
            .lock()
            .iter()
            .find(|(id, _)| id == playlist_id)
            .map(|(_, songs)| songs.clone())
            .ok_or_else(|| anyhow!("playlist {} not found", playlist_id))
    }

    async fn up_next(&self, video_id: &str) -> Result<Vec<UpNext>> {
        if video_id == "brokenbroke" {
            return Err(anyhow!("next endpoint failed"));
        }
        Ok(vec![UpNext {
            id: "nextnextnex".into(),
            title: "After".into(),
            artist: vec!["Band".into()],
            thumbnail: String::new(),
            duration: "3:00".into(),
        }])
    }
}

pub fn song(video_id: &str, title: &str) -> Song {
    Song {
        title: title.to_string(),
        artists: vec!["Artist".to_string()],
        thumbnail_url: None,
        video_id: video_id.to_string(),
    }
}

pub fn test_config() -> RelayConfig {
    RelayConfig {
        resolve_timeout_secs: 1,
        fetch_timeout_secs: 2,
        stream_idle_timeout_secs: 5,
        ..RelayConfig::default()
    }
}

pub struct TestApp {
    pub server: AppServer,
    pub state: AppState,
}

pub async fn start_app(resolver: Arc<FakeResolver>, catalog: Arc<FakeCatalog>) -> TestApp {
    let config = test_config();
    let state = AppState {
        relay: Arc::new(AudioRelay::new(resolver, &config).unwrap()),
        catalog,
        trending: Arc::new(TrendingCache::new(config.trending_ttl())),
    };
    let server = AppServer::start(state.clone(), "127.0.0.1:0").await.unwrap();
    TestApp { server, state }
}

/// Media host fake. `/file` honours ranges, `/forbidden` rejects, `/norange` ignores ranges,
/// `/shifted` answers 206 but always from byte 0.
async fn media_host(req: Request) -> impl IntoResponse {
    let content = generate_content(1_000_000);
    let total = content.len() as u64;
    let path = req.uri().path().to_string();

    if path == "/forbidden" {
        return (StatusCode::FORBIDDEN, "nope").into_response();
    }

    let range = req
        .headers()
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .map(|s| s.to_string());

    if path == "/shifted" {
        let slice = content[..1000].to_vec();
        return (
            StatusCode::PARTIAL_CONTENT,
            [(header::CONTENT_RANGE, format!("bytes 0-999/{}", total))],
            slice,
        )
            .into_response();
    }

    match range {
        Some(rest) if path == "/file" => {
            let mut parts = rest.splitn(2, '-');
            let start: u64 = parts.next().unwrap_or("0").parse().unwrap_or(0);
            let end: u64 = parts
                .next()
                .and_then(|e| e.parse().ok())
                .unwrap_or(total - 1)
                .min(total - 1);
            let slice = content[start as usize..=end as usize].to_vec();
            (
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, "audio/webm".to_string()),
                    (header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, total)),
                    (header::CONTENT_LENGTH, slice.len().to_string()),
                ],
                slice,
            )
                .into_response()
        }
        _ => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "audio/webm".to_string())],
            content,
        )
            .into_response(),
    }
}

pub async fn start_media_host() -> SocketAddr {
    let app = Router::new()
        .route("/file", get(media_host))
        .route("/forbidden", get(media_host))
        .route("/norange", get(media_host))
        .route("/shifted", get(media_host));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}
