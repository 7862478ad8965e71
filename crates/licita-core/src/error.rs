//! Error types for Licita.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("File too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("AI service error: {0}")]
    Ai(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

pub type Result<T> = std::result::Result<T, Error>;
