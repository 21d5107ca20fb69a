//! Beacon Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other Beacon crates:
//! - Application configuration (server address, credentials, channel tuning)
//! - Global error types covering all error categories
//! - Structured logging with tracing
//! - Platform directory lookup
//! - Common constants

pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod constants;

// Re-export commonly used items at the crate root
pub use config::AppConfig;
pub use error::{BcError, BcResult};
pub use logging::init_logging;
pub use platform::Platform;
