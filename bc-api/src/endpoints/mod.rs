//! API endpoint modules organized by category.
//!
//! Each module provides typed methods for a group of related server endpoints.

pub mod auth;
pub mod notifications;
