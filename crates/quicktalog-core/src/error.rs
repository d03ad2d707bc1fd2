//! Error types for Quicktalog.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Rate limited by upstream service: {0}")]
    RateLimited(String),

    #[error("Upstream service rejected credentials: {0}")]
    UpstreamAuth(String),

    #[error("Upstream quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("No JSON object found in response")]
    NoStructuredData,

    #[error("Malformed JSON in response: {0}")]
    MalformedJson(String),

    #[error("No valid categories could be generated")]
    NoValidCategories,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
