use thiserror::Error;

use crate::db::StoreConflict;
use crate::scrape::{ExtractionError, FetchFailure};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Store conflict: {0}")]
    StoreConflict(#[from] StoreConflict),

    #[error("Precondition violated: {0}")]
    Precondition(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
