// Axum request handlers: audio relay, search, trending, up-next, stats.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::catalog::traits::MetadataProvider;
use crate::catalog::trending::TrendingCache;
use crate::config::DEFAULT_MIME_TYPE;
use crate::relay::audio::{AudioRelay, RelayResponse};

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<AudioRelay>,
    pub catalog: Arc<dyn MetadataProvider>,
    pub trending: Arc<TrendingCache>,
}

pub struct AppServer {
    port: u16,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/audio", get(audio_handler))
        .route("/api/search", get(search_handler))
        .route("/api/trending", get(trending_handler))
        .route("/api/nextsong/{video_id}", get(next_song_handler))
        .route("/api/stats", get(stats_handler))
        .with_state(state)
}

impl AppServer {
    /// Bind `bind_addr` and serve in the background, returning a handle.
    pub async fn start(state: AppState, bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = router(state);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        info!("tunestream listening on port {}", port);
        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Loopback URL for `path` on this server.
    pub fn url_for(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// Shutdown the server gracefully.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[derive(Debug, Deserialize)]
struct AudioParams {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

/// GET /api/audio?videoId=... with optional Range.
async fn audio_handler(
    State(state): State<AppState>,
    Query(params): Query<AudioParams>,
    headers: HeaderMap,
) -> Response {
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    debug!("audio request id={:?} range={:?}", params.video_id, range);

    match state.relay.serve(params.video_id.as_deref(), range).await {
        Ok(relay) => relay_response(relay),
        Err(e) => e.into_response(),
    }
}

fn relay_response(relay: RelayResponse) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&relay.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_MIME_TYPE)),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Some(len) = relay.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    let status = match relay.window {
        Some((window, total)) => {
            if let Ok(v) = HeaderValue::from_str(&window.content_range(total)) {
                headers.insert(header::CONTENT_RANGE, v);
            }
            StatusCode::PARTIAL_CONTENT
        }
        None => StatusCode::OK,
    };

    debug!("audio response status={} path={:?}", status.as_u16(), relay.path);
    (status, headers, Body::from_stream(relay.body)).into_response()
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

/// GET /api/search?q=...
async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let Some(query) = params.q.filter(|q| !q.trim().is_empty()) else {
        return json_error(StatusCode::BAD_REQUEST, "Missing search query");
    };

    match state.catalog.search(&query).await {
        Ok(songs) => Json(songs).into_response(),
        Err(e) => {
            error!("search failed query={:?}: {:#}", query, e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// GET /api/trending
async fn trending_handler(State(state): State<AppState>) -> Response {
    match state.trending.get_or_refresh(state.catalog.as_ref()).await {
        Ok(songs) => Json(songs.as_slice()).into_response(),
        Err(e) => {
            error!("trending fetch failed: {:#}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// GET /api/nextsong/{video_id}
async fn next_song_handler(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Response {
    match state.catalog.up_next(&video_id).await {
        Ok(songs) => Json(songs).into_response(),
        Err(e) => {
            error!("next song fetch failed id={}: {:#}", video_id, e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch next songs")
        }
    }
}

/// GET /api/stats
async fn stats_handler(State(state): State<AppState>) -> Response {
    Json(state.relay.stats().snapshot()).into_response()
}
