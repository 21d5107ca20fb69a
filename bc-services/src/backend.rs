//! Remote side of the notification feed.

use async_trait::async_trait;
use bc_api::{ApiClient, Notification, NotificationId};
use bc_core::error::BcResult;

/// Server operations the feed service needs.
#[async_trait]
pub trait NotificationBackend: Send + Sync + 'static {
    /// Most recent notifications, newest first.
    async fn fetch_recent(&self, page_size: u32) -> BcResult<Vec<Notification>>;

    async fn mark_read(&self, id: &NotificationId) -> BcResult<()>;

    async fn mark_all_read(&self) -> BcResult<()>;

    /// Install the credential used for later calls.
    async fn set_credential(&self, token: Option<String>);
}

#[async_trait]
impl NotificationBackend for ApiClient {
    async fn fetch_recent(&self, page_size: u32) -> BcResult<Vec<Notification>> {
        self.list_notifications(page_size).await
    }

    async fn mark_read(&self, id: &NotificationId) -> BcResult<()> {
        self.mark_notification_read(id).await
    }

    async fn mark_all_read(&self) -> BcResult<()> {
        self.mark_all_notifications_read().await
    }

    async fn set_credential(&self, token: Option<String>) {
        self.set_token(token).await
    }
}
