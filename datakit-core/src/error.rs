use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Construction and configuration failures.
///
/// Query-time conditions (cache misses, empty criteria, unmatched filters)
/// are never errors; they surface as `None` or empty collections.
#[derive(Error, Debug)]
pub enum Error {
    #[error("similarity threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("cache capacity must be greater than zero")]
    InvalidCapacity,

    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
