// HTTP-facing error kinds for the audio relay.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Missing videoId")]
    MissingId,
    #[error("Invalid YouTube URL or videoId")]
    InvalidId(String),
    #[error("No audio format found")]
    NotFound,
    #[error("Range Not Satisfiable")]
    RangeNotSatisfiable { content_length: u64 },
    #[error("upstream timed out during {0}")]
    UpstreamTimeout(&'static str),
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingId | Self::InvalidId(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::RangeNotSatisfiable { content_length } => (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{}", content_length))],
            )
                .into_response(),
            other => {
                if status.is_server_error() {
                    error!("audio relay failed: {:#}", other);
                }
                (status, Json(json!({ "error": other.to_string() }))).into_response()
            }
        }
    }
}
