//! Error types for Parley operations

use std::time::Duration;

/// Result type for Parley operations
pub type Result<T> = std::result::Result<T, ParleyError>;

/// Error types for the Parley dialogue core
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The dialogue backend failed (transport, status or payload)
    #[error("Backend error: {0}")]
    Backend(String),

    /// No dialogue backend is configured
    #[error("Dialogue backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The dialogue backend did not answer in time
    #[error("Backend request timed out after {0:?}")]
    Timeout(Duration),

    /// Command addressed to an NPC the session does not know
    #[error("Unknown NPC: {0}")]
    UnknownNpc(String),

    /// The session loop has shut down
    #[error("Session closed")]
    SessionClosed,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ParleyError {
    fn from(s: String) -> Self {
        ParleyError::Other(s)
    }
}

impl From<&str> for ParleyError {
    fn from(s: &str) -> Self {
        ParleyError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ParleyError {
    fn from(err: anyhow::Error) -> Self {
        ParleyError::Other(err.to_string())
    }
}

impl From<figment::Error> for ParleyError {
    fn from(err: figment::Error) -> Self {
        ParleyError::Configuration(err.to_string())
    }
}
