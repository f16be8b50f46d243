//! Error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or scoring a comment table.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Missing required column '{column}' in {}", path.display())]
    MissingColumn { column: String, path: PathBuf },

    #[error("Invalid value {value:?} for column '{column}' at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the video catalog client.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("YOUTUBE_API_KEY is not set")]
    MissingApiKey,

    #[error("YouTube request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("YouTube API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Comments unavailable for video {video_id} (disabled or quota exceeded)")]
    CommentsForbidden { video_id: String },

    #[error("YouTube search failed after {attempts} attempts. Last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Errors raised by a sentiment classifier for a single text.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Sidecar request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sidecar returned {0}")]
    Status(u16),

    #[error("Classifier produced an invalid score: {0}")]
    InvalidScore(f64),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// HTTP API error.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Job queue unavailable (503)
    #[error("Queue unavailable: {0}")]
    Queue(#[from] redis::RedisError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Queue(_) => (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_UNAVAILABLE"),
            ApiError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
