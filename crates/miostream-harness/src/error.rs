//! Harness error type.

use miostream::StreamError;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stream: {0}")]
    Stream(#[from] StreamError),
    #[error("fixture {path}: {message}")]
    Fixture { path: String, message: String },
}
