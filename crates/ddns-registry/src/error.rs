//! Error types for the provider registry service
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the registry service
#[derive(Error, Debug)]
pub enum Error {
    /// Durable store failures (open, read, write, close)
    #[error("Store error: {0}")]
    Store(String),

    /// Caller supplied an invalid request
    #[error("Validation error: {0}")]
    Validation(String),

    /// A listener could not be bound
    #[error("Failed to bind {endpoint}: {source}")]
    Bind {
        /// Human-readable endpoint description
        endpoint: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Companion application could not be launched
    #[error("Subprocess error: {0}")]
    Subprocess(String),

    /// Listeners did not close within the grace period
    #[error("Shutdown timed out after {grace:?} with {pending} listener(s) still open")]
    ShutdownTimeout {
        /// Grace period that elapsed
        grace: std::time::Duration,
        /// Listeners that had not closed yet
        pending: usize,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors outside of binding (stale socket cleanup, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a bind error for the given endpoint
    pub fn bind(endpoint: impl ToString, source: std::io::Error) -> Self {
        Self::Bind {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    /// Create a subprocess error
    pub fn subprocess(msg: impl Into<String>) -> Self {
        Self::Subprocess(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the caller is at fault (maps to a 4xx response)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Store(format!("store task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_client_error() {
        assert!(Error::validation("name is empty").is_client_error());
        assert!(!Error::store("disk full").is_client_error());
    }

    #[test]
    fn bind_error_names_endpoint() {
        let err = Error::bind(
            "tcp://127.0.0.1:65000",
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        );
        let text = err.to_string();
        assert!(text.contains("tcp://127.0.0.1:65000"));
        assert!(text.contains("address in use"));
    }
}
