//! CLI command implementations.

pub mod config;
pub mod listen;
pub mod login;
pub mod notifications;
pub mod status;

use bc_api::ApiClient;
use bc_core::config::ConfigHandle;
use bc_core::error::{BcError, BcResult};
use chrono::{DateTime, Local, Utc};

/// Helper to create an API client from config, carrying the stored token.
pub async fn create_api_client(config: &ConfigHandle) -> BcResult<ApiClient> {
    let cfg = config.read().await;
    ApiClient::from_config(&cfg)
}

/// Fail early with a readable message when no token is stored.
pub async fn require_login(config: &ConfigHandle) -> BcResult<()> {
    if config.read().await.is_logged_in() {
        Ok(())
    } else {
        Err(BcError::AuthFailed(
            "not logged in, run `beacon login` first".into(),
        ))
    }
}

/// Truncate a string to a maximum number of characters, appending an
/// ellipsis if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}

/// Render a server timestamp in local time.
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into())
}

/// Hide all but the first few characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}****")
}
