//! Notification feed service.
//!
//! Owns the push channel and keeps a [`NotificationFeed`] current from two
//! sources: channel frames as they arrive, and a fallback poll that runs
//! only while the channel is not open. Every change is announced on the
//! [`EventBus`].

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use bc_api::{Notification, NotificationId};
use bc_core::config::AppConfig;
use bc_core::error::{BcError, BcResult};
use bc_socket::{
    ChannelClient, ChannelEndpoint, ChannelError, ChannelHandle, ChannelHandler, ChannelOptions,
    ChannelState, ChannelStatus, TransportFactory, WsTransportFactory,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backend::NotificationBackend;
use crate::credentials::{CredentialStore, StoreTokenProvider};
use crate::event_bus::{AppEvent, EventBus};
use crate::feed::{Ingest, NotificationFeed, SyncSummary};
use crate::service::{Service, ServiceState};

/// Feed shared between the service, the channel handler and the poller.
pub type SharedFeed = Arc<RwLock<NotificationFeed>>;

fn write_feed(feed: &SharedFeed) -> RwLockWriteGuard<'_, NotificationFeed> {
    feed.write().unwrap_or_else(PoisonError::into_inner)
}

/// Tuning for the feed service.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub endpoint: ChannelEndpoint,
    pub options: ChannelOptions,
    /// Fallback poll period while the channel is not open.
    pub poll_interval: Duration,
    /// Notifications fetched per poll.
    pub page_size: u32,
}

impl FeedSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            endpoint: ChannelEndpoint::from_config(config),
            options: ChannelOptions::from(&config.channel),
            poll_interval: Duration::from_secs(config.feed.poll_interval_secs.max(1)),
            page_size: config.feed.page_size.max(1),
        }
    }
}

/// Channel callbacks: fold frames into the feed and announce them.
struct FeedHandler {
    feed: SharedFeed,
    bus: EventBus,
}

impl ChannelHandler for FeedHandler {
    fn on_message(&self, payload: serde_json::Value) {
        let ingested = write_feed(&self.feed).ingest_payload(&payload);
        match ingested {
            Some((Ingest::Added, notification)) => {
                info!("notification {} received", notification.id);
                self.bus.emit(AppEvent::NotificationReceived { notification });
            }
            Some((Ingest::Updated, notification)) => {
                debug!("notification {} updated", notification.id);
            }
            Some((Ingest::Unchanged, _)) | None => {}
        }
    }

    fn on_error(&self, error: &ChannelError) {
        self.bus.emit(AppEvent::ChannelError {
            message: error.to_string(),
        });
    }
}

/// Fetch the latest page and merge it into the feed.
async fn sync_once(
    backend: &dyn NotificationBackend,
    feed: &SharedFeed,
    bus: &EventBus,
    page_size: u32,
) -> BcResult<SyncSummary> {
    let polled = backend.fetch_recent(page_size).await?;
    let (summary, unread) = {
        let mut feed = write_feed(feed);
        let summary = feed.sync_from(polled);
        (summary, feed.unread_count())
    };
    bus.emit(AppEvent::NotificationsSynced {
        added: summary.added,
        updated: summary.updated,
        unread,
    });
    Ok(summary)
}

/// Service that keeps the notification feed live.
pub struct FeedService<F = WsTransportFactory> {
    state: ServiceState,
    settings: FeedSettings,
    backend: Arc<dyn NotificationBackend>,
    credentials: Arc<dyn CredentialStore>,
    event_bus: EventBus,
    transport: F,
    feed: SharedFeed,
    channel: Option<ChannelHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl<F: TransportFactory + Clone> FeedService<F> {
    pub fn new(
        settings: FeedSettings,
        backend: Arc<dyn NotificationBackend>,
        credentials: Arc<dyn CredentialStore>,
        event_bus: EventBus,
        transport: F,
    ) -> Self {
        Self {
            state: ServiceState::Created,
            settings,
            backend,
            credentials,
            event_bus,
            transport,
            feed: Arc::new(RwLock::new(NotificationFeed::new())),
            channel: None,
            tasks: Vec::new(),
        }
    }

    pub fn feed(&self) -> SharedFeed {
        self.feed.clone()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn unread_count(&self) -> usize {
        self.feed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .unread_count()
    }

    /// Up to `limit` notifications, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Notification> {
        self.feed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .recent(limit)
    }

    /// Latest push channel status, once the service is running.
    pub fn channel_status(&self) -> Option<ChannelStatus> {
        self.channel.as_ref().map(ChannelHandle::status)
    }

    /// Poll the server now, regardless of channel state.
    pub async fn refresh(&self) -> BcResult<SyncSummary> {
        sync_once(
            self.backend.as_ref(),
            &self.feed,
            &self.event_bus,
            self.settings.page_size,
        )
        .await
    }

    /// Mark one notification read on the server, then locally.
    pub async fn mark_read(&self, id: &NotificationId) -> BcResult<()> {
        self.backend.mark_read(id).await?;
        let unread = {
            let mut feed = write_feed(&self.feed);
            feed.mark_read(id);
            feed.unread_count()
        };
        self.event_bus.emit(AppEvent::NotificationRead {
            id: Some(id.clone()),
            unread,
        });
        Ok(())
    }

    /// Mark everything read on the server, then locally.
    pub async fn mark_all_read(&self) -> BcResult<()> {
        self.backend.mark_all_read().await?;
        let changed = write_feed(&self.feed).mark_all_read();
        debug!("marked {changed} notification(s) read");
        self.event_bus.emit(AppEvent::NotificationRead { id: None, unread: 0 });
        Ok(())
    }

    fn start_channel(&mut self, token: &str) {
        let handler = FeedHandler {
            feed: self.feed.clone(),
            bus: self.event_bus.clone(),
        };
        let handle = ChannelClient::new(self.settings.endpoint.clone(), self.transport.clone())
            .with_options(self.settings.options.clone())
            .with_token_provider(StoreTokenProvider::new(self.credentials.clone()))
            .start(token, handler);

        let status = handle.subscribe();
        let watcher = self.spawn_status_watcher(status.clone());
        let poller = self.spawn_poller(status);
        self.tasks.extend([watcher, poller]);
        self.channel = Some(handle);
    }

    /// Republish channel status changes on the event bus.
    fn spawn_status_watcher(&self, mut status: watch::Receiver<ChannelStatus>) -> JoinHandle<()> {
        let bus = self.event_bus.clone();
        tokio::spawn(async move {
            loop {
                let current = status.borrow_and_update().clone();
                if current.state == ChannelState::Exhausted {
                    warn!("push channel gave up, relying on fallback polling");
                }
                bus.emit(AppEvent::ChannelStateChanged {
                    state: current.state,
                    attempt_count: current.attempt_count,
                });
                if status.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Poll on a fixed period while the channel is not open.
    fn spawn_poller(&self, status: watch::Receiver<ChannelStatus>) -> JoinHandle<()> {
        let backend = self.backend.clone();
        let feed = self.feed.clone();
        let bus = self.event_bus.clone();
        let page_size = self.settings.page_size;
        let period = self.settings.poll_interval;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let state = status.borrow().state;
                if state == ChannelState::Open {
                    continue;
                }
                debug!("channel {state}, running fallback poll");
                match sync_once(backend.as_ref(), &feed, &bus, page_size).await {
                    Ok(summary) => debug!(
                        "fallback poll: {} added, {} updated",
                        summary.added, summary.updated
                    ),
                    Err(e) => warn!("fallback poll failed: {e}"),
                }
            }
        })
    }

    fn stop(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.dispose();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[async_trait]
impl<F: TransportFactory + Clone> Service for FeedService<F> {
    fn name(&self) -> &str {
        "feed"
    }

    fn state(&self) -> ServiceState {
        self.state
    }

    async fn init(&mut self) -> BcResult<()> {
        self.state = ServiceState::Initializing;

        let Some(token) = self.credentials.load().await else {
            self.state = ServiceState::Failed;
            return Err(BcError::AuthFailed("no stored credential".into()));
        };
        self.backend.set_credential(Some(token.clone())).await;

        if let Err(e) = self.refresh().await {
            warn!("initial notification sync failed: {e}");
        }

        self.start_channel(&token);
        self.state = ServiceState::Running;
        let (total, unread) = {
            let feed = self.feed.read().unwrap_or_else(PoisonError::into_inner);
            (feed.len(), feed.unread_count())
        };
        info!("feed service running ({total} notification(s), {unread} unread)");
        Ok(())
    }

    async fn shutdown(&mut self) -> BcResult<()> {
        self.state = ServiceState::ShuttingDown;
        self.stop();
        self.state = ServiceState::Stopped;
        info!("feed service stopped");
        Ok(())
    }
}

impl<F> Drop for FeedService<F> {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let mut config = AppConfig::default();
        config.server.address = "https://api.example.com".into();
        config.feed.poll_interval_secs = 0;
        config.feed.page_size = 20;

        let settings = FeedSettings::from_config(&config);
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.page_size, 20);
        assert_eq!(
            settings.endpoint.url_for("t"),
            "wss://api.example.com/ws/notifications/?token=t"
        );
    }

    #[test]
    fn test_handler_announces_new_notifications_once() {
        let feed: SharedFeed = Arc::default();
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let handler = FeedHandler {
            feed: feed.clone(),
            bus,
        };

        let payload = serde_json::json!({"id": 1, "title": "Deploy done"});
        handler.on_message(payload.clone());
        handler.on_message(payload);
        handler.on_message(serde_json::json!({"type": "pong"}));

        assert!(matches!(
            rx.try_recv().unwrap(),
            AppEvent::NotificationReceived { .. }
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(feed.read().unwrap().len(), 1);
    }

    #[test]
    fn test_handler_forwards_errors() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let handler = FeedHandler {
            feed: Arc::default(),
            bus,
        };
        handler.on_error(&ChannelError::Transport("reset".into()));
        match rx.try_recv().unwrap() {
            AppEvent::ChannelError { message } => assert!(message.contains("reset")),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
