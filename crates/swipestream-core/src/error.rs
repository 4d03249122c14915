//! Core error types for swipestream-core.
//!
//! Each concern carries its own thiserror enum; `CoreError` wraps them for
//! callers that only need one error type. Network-origin failures are always
//! classified into `RepositoryError` so callers can tell retryable conditions
//! (`Timeout`, `Network`) from non-retryable ones (`Unauthorized`,
//! `PermissionDenied`).

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for swipestream-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Selection buffer errors
    #[error("Selection buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Repository errors (local or remote store)
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Pre-fetch errors
    #[error("Prefetch error: {0}")]
    Prefetch(#[from] crate::prefetch::PrefetchError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Selection buffer errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// The buffer cannot be built from an empty candidate set.
    #[error("candidate set is empty")]
    EmptyCandidateSet,

    /// No identifier is available at the head of the pool.
    #[error("selection buffer is exhausted")]
    Exhausted,
}

/// Errors shared by every `StatusRepository` implementation.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// A write completed but could not be verified as durable.
    #[error("save could not be verified as durable")]
    SaveFailed,

    /// The requested item does not exist.
    #[error("item not found")]
    NotFound,

    /// The caller lacks permission for the underlying resource.
    #[error("permission denied")]
    PermissionDenied,

    /// The server rejected the credential (or its absence).
    #[error("not authorized")]
    Unauthorized,

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure other than a timeout.
    #[error("network error: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
    },

    /// The server reported a failure.
    #[error("server error: {0}")]
    Server(String),

    /// Local persistence failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything that fits no other bucket.
    #[error("unknown repository error")]
    Unknown,
}

impl RepositoryError {
    /// Whether a retry of the same operation could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RepositoryError::Timeout | RepositoryError::Network { .. }
        )
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

// Helper implementations for converting from other error types

impl From<reqwest::Error> for RepositoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RepositoryError::Timeout
        } else {
            RepositoryError::Network { source: err }
        }
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::Storage(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
