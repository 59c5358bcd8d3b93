//! Custom error types for sitesearch

use thiserror::Error;

/// Main error type for sitesearch operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Morphology error: {0}")]
    Morphology(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Empty search query")]
    EmptyQuery,

    #[error("Indexing is in progress for {0}")]
    IndexingInProgress(String),

    #[error("Indexing already running")]
    AlreadyIndexing,

    #[error("Site not found: {0}")]
    SiteNotFound(String),

    #[error("Page is outside the configured sites: {0}")]
    PageOutsideSites(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for sitesearch
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error should be reported to the caller as a rejected
    /// request rather than a system fault.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyQuery
                | Error::IndexingInProgress(_)
                | Error::AlreadyIndexing
                | Error::SiteNotFound(_)
                | Error::PageOutsideSites(_)
        )
    }
}
