//! Error handling utilities for route handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    /// Missing or empty required field, malformed body
    #[error("{0}")]
    InvalidInput(String),

    /// OCR produced nothing usable
    #[error("{0}")]
    NoTextFound(String),

    /// Temporary media could not be written or read
    #[error("media I/O failure: {0}")]
    MediaIo(#[from] std::io::Error),

    /// Classifier, OCR or decoder failure
    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),

    /// Blocking task panicked or was cancelled
    #[error("worker failed: {0}")]
    Worker(String),
}

impl DetectError {
    pub fn status(&self) -> StatusCode {
        match self {
            DetectError::InvalidInput(_) | DetectError::NoTextFound(_) => StatusCode::BAD_REQUEST,
            DetectError::MediaIo(_) | DetectError::Inference(_) | DetectError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Wrap an image crate error as a media I/O failure
    pub fn media(err: image::ImageError) -> Self {
        DetectError::MediaIo(std::io::Error::other(err))
    }
}

impl IntoResponse for DetectError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("[detect] {}", self);
        } else {
            tracing::debug!("[detect] Rejected request: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Extension trait for logging foreign errors and converting to DetectError
pub trait LogErr<T> {
    /// Log error with context and return an internal worker failure
    fn log_internal(self, context: &str) -> Result<T, DetectError>;

    /// Log error with context and return InvalidInput with a client-facing message
    fn log_invalid(self, context: &str, message: &str) -> Result<T, DetectError>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_internal(self, context: &str) -> Result<T, DetectError> {
        self.map_err(|e| {
            tracing::error!("{}: {}", context, e);
            DetectError::Worker(e.to_string())
        })
    }

    fn log_invalid(self, context: &str, message: &str) -> Result<T, DetectError> {
        self.map_err(|e| {
            tracing::warn!("{}: {}", context, e);
            DetectError::InvalidInput(message.to_string())
        })
    }
}
