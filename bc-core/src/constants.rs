//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Beacon";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// REST API path prefix on the backend.
pub const API_PREFIX: &str = "/api";

/// Default server API timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// Default path of the push channel, relative to the server address.
pub const DEFAULT_CHANNEL_PATH: &str = "ws/notifications";

/// Default first reconnect wait in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;

/// Default backoff ceiling in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Default keepalive period in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 20_000;

/// Default fallback poll period in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default number of notifications fetched per poll.
pub const DEFAULT_FEED_PAGE_SIZE: u32 = 50;

/// Keepalive frame sent over an open channel.
pub const HEARTBEAT_FRAME: &str = r#"{"type":"ping"}"#;
