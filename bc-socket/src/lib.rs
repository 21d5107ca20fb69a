//! Beacon Socket - self-healing push channel for real-time notifications.
//!
//! This crate provides the channel client that handles:
//! - One logical subscription to the backend's push endpoint
//! - Automatic reconnection with bounded exponential backoff
//! - Keepalive heartbeats while the channel is open
//! - Stale-event rejection across superseded connections
//! - Idempotent disposal that silences all callbacks
//!
//! The reconnection logic lives in [`state::ChannelSession`], a pure state
//! machine; [`client`] drives it on a single tokio task.

pub mod backoff;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod options;
pub mod state;
pub mod transport;
pub mod ws;

mod gate;

// Re-export key types
pub use backoff::Backoff;
pub use client::{open_channel, ChannelClient, ChannelHandle};
pub use endpoint::{derive_channel_url, ChannelEndpoint};
pub use error::ChannelError;
pub use events::{handler, ChannelHandler, ChannelState, ChannelStatus, FnHandler};
pub use options::ChannelOptions;
pub use transport::{StaticToken, TokenProvider, Transport, TransportEvent, TransportFactory, TransportSink};
pub use ws::WsTransportFactory;
