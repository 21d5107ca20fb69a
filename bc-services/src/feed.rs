//! In-memory notification feed.
//!
//! Notifications are keyed by server identity and kept in arrival order, so
//! a notification pushed over the channel and later returned by a poll is
//! stored once. Once marked read locally, a notification stays read even if
//! a stale redelivery says otherwise.

use std::collections::VecDeque;

use bc_api::{Notification, NotificationId};
use tracing::debug;

/// Default number of notifications retained.
pub const DEFAULT_FEED_CAPACITY: usize = 500;

/// Result of ingesting one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// First time this identity was seen.
    Added,
    /// Known identity whose content changed.
    Updated,
    /// Known identity, nothing changed.
    Unchanged,
}

/// Counts from merging a poll result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub added: usize,
    pub updated: usize,
}

#[derive(Debug, Clone)]
pub struct NotificationFeed {
    entries: VecDeque<Notification>,
    capacity: usize,
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// A feed that drops its oldest entries beyond `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|n| !n.is_read).count()
    }

    pub fn contains(&self, id: &NotificationId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.position(id).map(|i| &self.entries[i])
    }

    /// All notifications, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    /// Up to `limit` notifications, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Notification> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    fn position(&self, id: &NotificationId) -> Option<usize> {
        self.entries.iter().position(|n| n.id == *id)
    }

    /// Insert or refresh one notification.
    pub fn ingest(&mut self, mut notification: Notification) -> Ingest {
        match self.position(&notification.id) {
            Some(i) => {
                let existing = &mut self.entries[i];
                if existing.is_read {
                    notification.is_read = true;
                }
                if *existing == notification {
                    Ingest::Unchanged
                } else {
                    *existing = notification;
                    Ingest::Updated
                }
            }
            None => {
                self.entries.push_back(notification);
                while self.entries.len() > self.capacity {
                    if let Some(dropped) = self.entries.pop_front() {
                        debug!("feed full, dropping notification {}", dropped.id);
                    }
                }
                Ingest::Added
            }
        }
    }

    /// Ingest a raw channel payload.
    ///
    /// Payloads that do not carry a notification identity are ignored and
    /// yield `None`.
    pub fn ingest_payload(&mut self, payload: &serde_json::Value) -> Option<(Ingest, Notification)> {
        let Some(notification) = Notification::from_payload(payload) else {
            debug!("ignoring channel payload without a notification id");
            return None;
        };
        let outcome = self.ingest(notification.clone());
        Some((outcome, notification))
    }

    /// Merge a poll result, which the server returns newest first.
    pub fn sync_from(&mut self, polled: Vec<Notification>) -> SyncSummary {
        let mut summary = SyncSummary::default();
        for notification in polled.into_iter().rev() {
            match self.ingest(notification) {
                Ingest::Added => summary.added += 1,
                Ingest::Updated => summary.updated += 1,
                Ingest::Unchanged => {}
            }
        }
        summary
    }

    /// Mark one notification read. Returns whether anything changed.
    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        match self.position(id) {
            Some(i) if !self.entries[i].is_read => {
                self.entries[i].is_read = true;
                true
            }
            _ => false,
        }
    }

    /// Mark everything read. Returns how many changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for n in self.entries.iter_mut().filter(|n| !n.is_read) {
            n.is_read = true;
            changed += 1;
        }
        changed
    }
}
