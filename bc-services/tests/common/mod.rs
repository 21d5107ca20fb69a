//! Shared test utilities for service integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bc_api::{Notification, NotificationId};
use bc_core::error::{BcError, BcResult};
use bc_services::{
    AppEvent, CredentialStore, EventBus, FeedService, FeedSettings, MemoryCredentialStore,
    NotificationBackend,
};
use bc_socket::{
    ChannelEndpoint, ChannelError, ChannelOptions, Transport, TransportFactory, TransportSink,
};
use serde_json::json;
use tokio::sync::broadcast;

/// Build a notification with the given id and read flag.
pub fn note(id: i64, is_read: bool) -> Notification {
    serde_json::from_value(json!({
        "id": id,
        "title": format!("Notification {id}"),
        "message": "body",
        "is_read": is_read,
    }))
    .expect("valid notification")
}

/// Backend double: serves a fixed page and records calls.
#[derive(Default)]
pub struct FakeBackend {
    pub page: Mutex<Vec<Notification>>,
    pub fetches: AtomicUsize,
    pub read_calls: Mutex<Vec<NotificationId>>,
    pub read_all_calls: AtomicUsize,
    pub credential: Mutex<Option<String>>,
    pub fail: AtomicBool,
}

impl FakeBackend {
    pub fn with_page(page: Vec<Notification>) -> Arc<Self> {
        let backend = Self::default();
        *backend.page.lock().unwrap() = page;
        Arc::new(backend)
    }

    pub fn set_page(&self, page: Vec<Notification>) {
        *self.page.lock().unwrap() = page;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check(&self) -> BcResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(BcError::ServerError {
                status: 503,
                message: "unavailable".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NotificationBackend for FakeBackend {
    async fn fetch_recent(&self, page_size: u32) -> BcResult<Vec<Notification>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let page = self.page.lock().unwrap();
        Ok(page.iter().take(page_size as usize).cloned().collect())
    }

    async fn mark_read(&self, id: &NotificationId) -> BcResult<()> {
        self.check()?;
        self.read_calls.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn mark_all_read(&self) -> BcResult<()> {
        self.check()?;
        self.read_all_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_credential(&self, token: Option<String>) {
        *self.credential.lock().unwrap() = token;
    }
}

/// Transport double: every connection opens (or hangs) and is recorded.
#[derive(Clone, Default)]
pub struct FakeTransport {
    pub hang: Arc<AtomicBool>,
    pub sinks: Arc<Mutex<Vec<(String, TransportSink)>>>,
}

impl FakeTransport {
    pub fn hanging() -> Self {
        let transport = Self::default();
        transport.hang.store(true, Ordering::SeqCst);
        transport
    }

    pub fn connections(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    pub fn url(&self, index: usize) -> String {
        self.sinks.lock().unwrap()[index].0.clone()
    }

    /// Sink of the most recent connection.
    pub fn last_sink(&self) -> TransportSink {
        self.sinks
            .lock()
            .unwrap()
            .last()
            .map(|(_, sink)| sink.clone())
            .expect("no connection was opened")
    }
}

struct FakeConnection;

impl Transport for FakeConnection {
    fn send(&self, _frame: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    fn close(&self) {}
}

impl TransportFactory for FakeTransport {
    fn open(&self, url: &str, sink: TransportSink) -> Box<dyn Transport> {
        self.sinks
            .lock()
            .unwrap()
            .push((url.to_string(), sink.clone()));
        if !self.hang.load(Ordering::SeqCst) {
            sink.open();
        }
        Box::new(FakeConnection)
    }
}

pub fn test_settings() -> FeedSettings {
    FeedSettings {
        endpoint: ChannelEndpoint::new("http://localhost:8000", "ws/notifications"),
        options: ChannelOptions::default().without_heartbeat(),
        poll_interval: Duration::from_secs(60),
        page_size: 50,
    }
}

pub fn memory_store(token: &str) -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::new(Some(token.to_string())))
}

pub fn create_service(
    backend: Arc<FakeBackend>,
    credentials: Arc<dyn CredentialStore>,
    transport: FakeTransport,
) -> FeedService<FakeTransport> {
    FeedService::new(
        test_settings(),
        backend,
        credentials,
        EventBus::new(64),
        transport,
    )
}

/// Drain everything currently queued on a bus receiver.
pub fn drain(rx: &mut broadcast::Receiver<AppEvent>) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Let spawned tasks run without moving far in virtual time.
pub async fn settle() {
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
