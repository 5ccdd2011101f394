//! Error types for Trellis.
//!
//! Resolver operations never fail on well-formed input: an enabled identifier
//! that is missing from the catalog is silently filtered, and unsatisfiable
//! dependencies are a first-class derived state rather than an error. The
//! variants here cover the store boundary, snapshot decoding, and misuse of
//! the toggle session by its driver.

use thiserror::Error;

/// Main error type for the Trellis library.
#[derive(Debug, Error)]
pub enum TrellisError {
    // Store boundary errors
    #[error("Plugin store error: {message}")]
    Store {
        message: String,
        /// Optional cause description from the transport collaborator
        cause: Option<String>,
    },

    // Serialization errors
    #[error("Snapshot decode error: {message}")]
    SnapshotDecode {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Session driver errors
    #[error("A persistence round-trip is already in flight")]
    PersistInFlight,

    #[error("No persistence round-trip is in flight")]
    NoPersistInFlight,

    #[error("Plugin catalog has not been loaded yet")]
    NotLoaded,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Trellis operations.
pub type Result<T> = std::result::Result<T, TrellisError>;

impl From<serde_json::Error> for TrellisError {
    fn from(err: serde_json::Error) -> Self {
        TrellisError::SnapshotDecode {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl TrellisError {
    /// Create a store error from any displayable transport failure.
    pub fn store(message: impl Into<String>) -> Self {
        TrellisError::Store {
            message: message.into(),
            cause: None,
        }
    }
}
