use thiserror::Error;

/// Error type returned by data sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] datakit_core::Error),

    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("failed to fetch {namespace}: {source}")]
    Source {
        namespace: String,
        #[source]
        source: BoxError,
    },
}
