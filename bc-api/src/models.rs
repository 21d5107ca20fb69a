//! Notification model shared by the REST endpoints and the push channel.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Server-assigned notification identity.
///
/// The backend may send numeric or string ids; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for NotificationId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for NotificationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Self(n.to_string())),
            Raw::Text(s) if !s.trim().is_empty() => Ok(Self(s)),
            Raw::Text(_) => Err(serde::de::Error::custom("empty notification id")),
        }
    }
}

/// One notification addressed to the current user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    /// Category such as "info", "alert" or "mention".
    #[serde(default, alias = "type", alias = "notification_type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Fields this client does not interpret, kept as received.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Notification {
    /// Extract a notification from a push channel payload.
    ///
    /// Accepts the notification itself or one wrapped under `notification`
    /// or `data`. Returns `None` for payloads without an identity, such as
    /// keepalive replies.
    pub fn from_payload(payload: &serde_json::Value) -> Option<Self> {
        let candidates = [
            Some(payload),
            payload.get("notification"),
            payload.get("data"),
        ];
        candidates
            .into_iter()
            .flatten()
            .filter(|v| v.get("id").is_some_and(|id| !id.is_null()))
            .find_map(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Short single-line label for display.
    pub fn headline(&self) -> &str {
        if self.title.is_empty() {
            &self.message
        } else {
            &self.title
        }
    }
}
