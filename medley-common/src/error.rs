//! Common error types for the Medley console core

use thiserror::Error;

/// Common result type for console operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across console subsystems
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure (connection, timeout, malformed response)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error reported by the remote service for a request
    #[error("Remote error {code}: {message}")]
    Remote { code: String, message: String },

    /// Response payload could not be decoded into the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Preference storage error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Operation superseded or torn down before completion
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error represents the remote service denying access
    /// to the requested resource
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Error::Remote { code, .. }
                if code == "FORBIDDEN" || code == "PERMISSION_DENIED"
        )
    }
}
