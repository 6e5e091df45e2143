//! Error types reported by hosted servers.

use thiserror::Error;

/// Errors a hosted server can report to the daemon.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Connection properties are missing or invalid.
    #[error("Properties error: {0}")]
    Properties(String),

    /// The server could not reach or hold its backing connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ServerError {
    /// Whether the error stems from configuration rather than connectivity.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Properties(_) | Self::Toml(_))
    }
}

/// Result type for server operations.
pub type ServerResult<T> = std::result::Result<T, ServerError>;
