//! Error types for the Kalon explorer client

use std::time::Duration;
use thiserror::Error;

/// Failure of a single request against the explorer backend.
///
/// Every transport or decoding problem is normalized into one of these four
/// variants so the scheduler can store it in a resource state and the view
/// layer can render it without knowing about HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// No response was received (connection refused, DNS, reset, ...).
    #[error("Network error: {0}")]
    Network(String),
    /// The request exceeded the configured bound.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The backend answered with a 4xx/5xx status.
    #[error("Server error: HTTP {0}")]
    Server(u16),
    /// The body was not a `{success: true, data: ...}` envelope of the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl FetchError {
    /// True when the backend reported that the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Server(404))
    }

    /// Short, stable label used in log fields and staleness markers.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Timeout(_) => "timeout",
            FetchError::Server(_) => "server",
            FetchError::Protocol(_) => "protocol",
        }
    }
}

/// Outcome of a search that did not produce a navigation target.
///
/// Search failures are ordinary results, not exceptional conditions:
/// "nothing matched" is the most common answer to a free-text query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Nothing found for '{0}'")]
    NotFound(String),
    /// The lookup could not be completed because the backend was unreachable.
    #[error("Search unavailable: {0}")]
    Unavailable(FetchError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Umbrella error for callers that drive the whole client (the CLI binary).
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ExplorerError>;
