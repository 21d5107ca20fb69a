//! Capability interfaces the channel consumes: credentials and transports.
//!
//! A [`TransportFactory`] opens one physical connection per call and reports
//! its lifecycle through the [`TransportSink`] it was given. Every sink is
//! stamped with the generation of the attempt that created it, so events from
//! a superseded connection are recognized and dropped by the session.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChannelError;
use crate::state::{Generation, Input};

/// Supplies the current credential, read once per connection attempt.
#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    /// The current credential, or `None` when unauthenticated.
    async fn token(&self) -> Option<String>;
}

/// A credential that never changes.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|t| !t.is_empty())
    }
}

/// Lifecycle events a transport reports, one per event slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(String),
    Error(ChannelError),
    Close,
}

/// Where a transport reports its events.
///
/// Cheap to clone. Sending after the channel has shut down is a no-op.
#[derive(Debug, Clone)]
pub struct TransportSink {
    generation: Generation,
    tx: mpsc::UnboundedSender<Input>,
}

impl TransportSink {
    pub(crate) fn new(generation: Generation, tx: mpsc::UnboundedSender<Input>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the attempt this sink belongs to.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Report an event.
    pub fn emit(&self, event: TransportEvent) {
        let generation = self.generation;
        let input = match event {
            TransportEvent::Open => Input::Opened(generation),
            TransportEvent::Message(text) => Input::Frame(generation, text),
            TransportEvent::Error(err) => Input::TransportError(generation, err),
            TransportEvent::Close => Input::Closed(generation),
        };
        let _ = self.tx.send(input);
    }

    pub fn open(&self) {
        self.emit(TransportEvent::Open);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    pub fn error(&self, error: ChannelError) {
        self.emit(TransportEvent::Error(error));
    }

    pub fn close(&self) {
        self.emit(TransportEvent::Close);
    }

    /// Whether the channel that owns this sink has shut down.
    pub fn is_detached(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One physical bidirectional connection.
///
/// Both operations must return without blocking.
pub trait Transport: Send {
    /// Queue a text frame for sending.
    fn send(&self, frame: &str) -> Result<(), ChannelError>;

    /// Start closing the connection. Calling it more than once is harmless.
    fn close(&self);
}

/// Opens transports. The only place a concrete transport technology appears.
pub trait TransportFactory: Send + Sync + 'static {
    /// Begin opening a connection to `url`.
    ///
    /// Must not block: the outcome is reported later through `sink` as
    /// `Open`, or as `Error` followed by `Close`.
    fn open(&self, url: &str, sink: TransportSink) -> Box<dyn Transport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(StaticToken::new("abc").token().await.as_deref(), Some("abc"));
        assert_eq!(StaticToken::new("").token().await, None);
    }

    #[test]
    fn test_sink_tags_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = TransportSink::new(7, tx);
        assert_eq!(sink.generation(), 7);

        sink.open();
        sink.message("{}");
        sink.error(ChannelError::Transport("x".into()));
        sink.close();

        assert_eq!(rx.try_recv().unwrap(), Input::Opened(7));
        assert_eq!(rx.try_recv().unwrap(), Input::Frame(7, "{}".into()));
        assert!(matches!(rx.try_recv().unwrap(), Input::TransportError(7, _)));
        assert_eq!(rx.try_recv().unwrap(), Input::Closed(7));
    }

    #[test]
    fn test_detached_sink_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = TransportSink::new(1, tx);
        drop(rx);
        assert!(sink.is_detached());
        sink.open();
    }
}
