// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Search API failure that escaped the scheduler
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Durable state exists but cannot be decoded
    #[error("State file {path:?} is corrupt: {message}")]
    StateCorrupt { path: PathBuf, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a corrupt-state error for the given file.
    pub fn state_corrupt(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::StateCorrupt {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Failure of a single search request or page sequence.
///
/// Raw transport errors are classified into one of these at the client
/// boundary and never travel further up as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The platform quota is exhausted; retry after the given delay.
    #[error("rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Network failure, timeout or 5xx response.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Authentication, malformed query or other non-retryable 4xx.
    #[error("fatal failure: {0}")]
    Fatal(String),
}

impl SearchError {
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    pub fn transient(message: impl fmt::Display) -> Self {
        Self::Transient(message.to_string())
    }

    pub fn fatal(message: impl fmt::Display) -> Self {
        Self::Fatal(message.to_string())
    }

    /// Whether a later cycle may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }
}

/// A report sink failed to deliver a batch.
#[derive(Error, Debug, Clone)]
#[error("delivery via {sink} failed: {message}")]
pub struct DeliveryError {
    pub sink: String,
    pub message: String,
}

impl DeliveryError {
    pub fn new(sink: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            sink: sink.into(),
            message: message.to_string(),
        }
    }
}
