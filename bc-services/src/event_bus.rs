//! Typed event bus for intra-service communication.
//!
//! Uses tokio broadcast channels to decouple services from one another.
//! Any service can emit events without knowing who is listening, and any
//! number of subscribers can independently consume events.

use std::sync::Arc;

use bc_api::{Notification, NotificationId};
use bc_socket::ChannelState;
use tokio::sync::broadcast;
use tracing::debug;

/// All application-level event types that flow through the event bus.
///
/// These are distinct from raw channel frames -- they represent processed,
/// application-meaningful state changes that consumers care about.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A notification not seen before arrived over the push channel.
    NotificationReceived {
        notification: Notification,
    },
    /// A fallback poll merged server state into the feed.
    NotificationsSynced {
        added: usize,
        updated: usize,
        unread: usize,
    },
    /// Notifications were marked read. `None` means all of them.
    NotificationRead {
        id: Option<NotificationId>,
        unread: usize,
    },
    /// The push channel reported a transport error.
    ChannelError {
        message: String,
    },
    /// The push channel changed state.
    ChannelStateChanged {
        state: ChannelState,
        attempt_count: u32,
    },
}

/// Application-wide event bus backed by a tokio broadcast channel.
///
/// Designed for fan-out delivery: every subscriber gets every event.
/// Slow subscribers that fall behind will receive a `Lagged` error
/// and may miss events, which is acceptable for display consumers.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to receive application events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => {
                debug!("event_bus: emitted {label} to {count} subscriber(s)");
            }
            Err(_) => {
                debug!("event_bus: no subscribers for {label}");
            }
        }
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Human-readable label for an event (for logging).
fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::NotificationReceived { .. } => "NotificationReceived",
        AppEvent::NotificationsSynced { .. } => "NotificationsSynced",
        AppEvent::NotificationRead { .. } => "NotificationRead",
        AppEvent::ChannelError { .. } => "ChannelError",
        AppEvent::ChannelStateChanged { .. } => "ChannelStateChanged",
    }
}
