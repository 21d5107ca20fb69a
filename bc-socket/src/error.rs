//! Error taxonomy of the push channel.
//!
//! These errors never cross the client's public boundary as `Err`; they are
//! handed to the owner's error callback or logged.

use thiserror::Error;

/// Errors observed by the push channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The transport could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The live transport reported an error.
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame could not be written to the transport.
    #[error("send failed: {0}")]
    Send(String),

    /// No credential was available for a connection attempt.
    #[error("missing credential")]
    MissingCredential,
}

impl From<ChannelError> for bc_core::BcError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::MissingCredential => {
                bc_core::BcError::AuthFailed("no credential for push channel".into())
            }
            other => bc_core::BcError::Channel(other.to_string()),
        }
    }
}
