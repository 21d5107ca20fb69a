//! Global error types for the Beacon application.
//!
//! All error categories across the application are unified into a single
//! `BcError` enum with conversions from underlying library errors. The push
//! channel keeps its own narrower taxonomy in `bc-socket` because its errors
//! are reported through callbacks rather than returned.

use thiserror::Error;

/// Convenience type alias for Results using BcError.
pub type BcResult<T> = Result<T, BcError>;

/// Unified error type covering all error categories in Beacon.
#[derive(Error, Debug)]
pub enum BcError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Network errors --
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Push channel error surfaced outside the channel itself.
    #[error("channel error: {0}")]
    Channel(String),

    /// Server returned an error response.
    #[error("server error (status {status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Error message from server.
        message: String,
    },

    /// Authentication failed or no credential is available.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested notification does not exist on the server.
    #[error("notification not found: {0}")]
    NotificationNotFound(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BcError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Http(_) | Self::Channel(_) => true,
            Self::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for BcError {
    fn from(e: serde_json::Error) -> Self {
        BcError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for BcError {
    fn from(e: toml::de::Error) -> Self {
        BcError::Config(e.to_string())
    }
}
