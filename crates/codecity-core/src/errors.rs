//! Error types for the codecity core library.

use std::path::PathBuf;

/// Top-level error enum for the codecity core library.
///
/// Only [`CityError::InvalidRoot`] escapes an analysis run; every other
/// variant is produced by explicit cache or history calls and is recovered
/// inside the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CityError {
    #[error("Root path not found or not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("History error: {0}")]
    History(#[from] git2::Error),
}

pub type CityResult<T> = Result<T, CityError>;
