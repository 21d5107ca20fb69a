//! Credential storage and its adapter into the push channel.
//!
//! The channel reads the credential before every connection attempt, so a
//! token refreshed by `login` is picked up on the next reconnect without
//! restarting the session.

use std::sync::Arc;

use async_trait::async_trait;
use bc_core::config::ConfigHandle;
use bc_core::error::BcResult;
use bc_socket::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Where the API token lives.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// The stored token, or `None` when logged out.
    async fn load(&self) -> Option<String>;

    /// Replace the stored token.
    async fn store(&self, token: &str) -> BcResult<()>;

    /// Forget the stored token.
    async fn clear(&self) -> BcResult<()>;
}

/// In-memory store, used by tests and one-shot commands.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.filter(|t| !t.trim().is_empty())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    async fn store(&self, token: &str) -> BcResult<()> {
        *self.token.write().await = Some(token.to_string()).filter(|t| !t.trim().is_empty());
        Ok(())
    }

    async fn clear(&self) -> BcResult<()> {
        *self.token.write().await = None;
        Ok(())
    }
}

/// Store backed by the `[auth]` section of the config file.
#[derive(Clone)]
pub struct ConfigCredentialStore {
    config: ConfigHandle,
}

impl ConfigCredentialStore {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CredentialStore for ConfigCredentialStore {
    async fn load(&self) -> Option<String> {
        let config = self.config.read().await;
        let token = config.auth.token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }

    async fn store(&self, token: &str) -> BcResult<()> {
        self.config.write().await.auth.token = token.trim().to_string();
        self.config.save().await?;
        info!("stored api token in config");
        Ok(())
    }

    async fn clear(&self) -> BcResult<()> {
        self.config.write().await.auth.token.clear();
        self.config.save().await?;
        info!("cleared api token from config");
        Ok(())
    }
}

/// Feeds a [`CredentialStore`] to the channel as its per-attempt token source.
#[derive(Clone)]
pub struct StoreTokenProvider {
    store: Arc<dyn CredentialStore>,
}

impl StoreTokenProvider {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TokenProvider for StoreTokenProvider {
    async fn token(&self) -> Option<String> {
        let token = self.store.load().await;
        if token.is_none() {
            debug!("credential store is empty");
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bc_core::AppConfig;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCredentialStore::new(Some("  ".into()));
        assert_eq!(store.load().await, None);

        store.store("abc").await.unwrap();
        assert_eq!(store.load().await.as_deref(), Some("abc"));

        store.clear().await.unwrap();
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_config_store_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let handle = ConfigHandle::with_path(AppConfig::default(), path.clone());
        let store = ConfigCredentialStore::new(handle);

        assert_eq!(store.load().await, None);
        store.store("tok-1").await.unwrap();

        let reloaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(reloaded.auth.token, "tok-1");

        store.clear().await.unwrap();
        let reloaded = AppConfig::load_from_file(&path).unwrap();
        assert!(reloaded.auth.token.is_empty());
    }

    #[tokio::test]
    async fn test_provider_sees_updates() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::default());
        let provider = StoreTokenProvider::new(store.clone());
        assert_eq!(provider.token().await, None);

        store.store("fresh").await.unwrap();
        assert_eq!(provider.token().await.as_deref(), Some("fresh"));
    }
}
