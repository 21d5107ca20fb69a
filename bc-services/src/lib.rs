//! Beacon Services - owner-side logic on top of the API client and channel.
//!
//! This crate provides the service trait and the concrete pieces an
//! application wires together:
//! - Credential storage, exposed to the channel as a per-attempt token source
//! - The notification feed (identity-keyed, arrival-ordered, unread tracking)
//! - The feed service: push channel plus fallback polling
//! - Event bus (typed intra-service communication)

pub mod backend;
pub mod credentials;
pub mod event_bus;
pub mod feed;
pub mod feed_service;
pub mod service;

// Re-export key types
pub use backend::NotificationBackend;
pub use credentials::{
    ConfigCredentialStore, CredentialStore, MemoryCredentialStore, StoreTokenProvider,
};
pub use event_bus::{AppEvent, EventBus};
pub use feed::{Ingest, NotificationFeed, SyncSummary};
pub use feed_service::{FeedService, FeedSettings, SharedFeed};
pub use service::{Service, ServiceState};
