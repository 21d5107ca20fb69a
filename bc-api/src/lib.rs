//! Beacon API - HTTP client for the notification backend's REST API.
//!
//! This crate provides a typed HTTP client for token authentication and the
//! notification endpoints. It handles the `Token` authorization header,
//! custom headers, self-signed certificates, and automatic retry with
//! exponential backoff.

pub mod client;
pub mod endpoints;
pub mod models;
pub mod response;

// Re-export key types
pub use client::{ApiClient, RetryConfig};
pub use models::{Notification, NotificationId};
pub use response::{ListResponse, Page};
