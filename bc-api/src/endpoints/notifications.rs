//! Notification endpoints.

use bc_core::error::{BcError, BcResult};

use crate::client::ApiClient;
use crate::models::{Notification, NotificationId};
use crate::response::{CountResponse, ListResponse};

/// Map a 404 on a single-notification endpoint to `NotificationNotFound`.
fn not_found_as(id: &NotificationId, err: BcError) -> BcError {
    match err {
        BcError::ServerError { status: 404, .. } => BcError::NotificationNotFound(id.to_string()),
        other => other,
    }
}

impl ApiClient {
    /// Fetch the most recent notifications, newest first.
    pub async fn list_notifications(&self, page_size: u32) -> BcResult<Vec<Notification>> {
        let path = format!("/notifications/?page_size={}", page_size.max(1));
        let resp: ListResponse<Notification> = self.get_json(&path).await?;
        Ok(resp.into_items())
    }

    /// Mark one notification as read.
    pub async fn mark_notification_read(&self, id: &NotificationId) -> BcResult<()> {
        let path = format!("/notifications/{}/read/", urlencoding::encode(id.as_str()));
        self.post(&path, &serde_json::json!({}))
            .await
            .map_err(|e| not_found_as(id, e))?;
        Ok(())
    }

    /// Mark every notification as read.
    pub async fn mark_all_notifications_read(&self) -> BcResult<()> {
        self.post("/notifications/read-all/", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Number of unread notifications.
    pub async fn unread_count(&self) -> BcResult<u64> {
        let resp: CountResponse = self.get_json("/notifications/unread-count/").await?;
        Ok(resp.count)
    }
}
