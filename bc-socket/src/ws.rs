//! WebSocket transport built on tokio-tungstenite.
//!
//! Each opened transport runs one task that owns the socket: it connects,
//! forwards inbound text frames to the sink, and writes queued outbound
//! frames. `send` and `close` only enqueue, so neither blocks the channel
//! driver.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::transport::{Transport, TransportFactory, TransportSink};

/// Default time allowed for the WebSocket handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

enum Outgoing {
    Frame(String),
    Close,
}

/// Opens WebSocket connections.
#[derive(Debug, Clone)]
pub struct WsTransportFactory {
    connect_timeout: Duration,
}

impl WsTransportFactory {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the handshake timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for WsTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for WsTransportFactory {
    fn open(&self, url: &str, sink: TransportSink) -> Box<dyn Transport> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(url.to_string(), self.connect_timeout, sink, rx));
        Box::new(WsTransport { tx })
    }
}

/// Handle to one socket task.
struct WsTransport {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Transport for WsTransport {
    fn send(&self, frame: &str) -> Result<(), ChannelError> {
        self.tx
            .send(Outgoing::Frame(frame.to_string()))
            .map_err(|_| ChannelError::Send("socket is closed".into()))
    }

    fn close(&self) {
        let _ = self.tx.send(Outgoing::Close);
    }
}

/// Wait until the handle asks to close, discarding frames queued meanwhile.
async fn close_requested(outgoing: &mut mpsc::UnboundedReceiver<Outgoing>) {
    loop {
        match outgoing.recv().await {
            Some(Outgoing::Frame(_)) => continue,
            Some(Outgoing::Close) | None => return,
        }
    }
}

async fn run_socket(
    url: String,
    connect_timeout: Duration,
    sink: TransportSink,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
    let connected = tokio::select! {
        result = timeout(connect_timeout, connect_async(url.as_str())) => result,
        _ = close_requested(&mut outgoing) => {
            debug!("connection #{} closed before the handshake finished", sink.generation());
            sink.close();
            return;
        }
    };

    let stream = match connected {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            sink.error(ChannelError::Connect(e.to_string()));
            sink.close();
            return;
        }
        Err(_) => {
            sink.error(ChannelError::Connect(format!(
                "handshake timed out after {:.0}s",
                connect_timeout.as_secs_f64()
            )));
            sink.close();
            return;
        }
    };

    sink.open();
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => sink.message(text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => sink.message(text),
                    Err(_) => warn!("dropping non-utf8 binary frame ({} bytes)", bytes.len()),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!("server closed connection #{}: {frame:?}", sink.generation());
                    break;
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    sink.error(ChannelError::Transport(e.to_string()));
                    break;
                }
                None => break,
            },
            command = outgoing.recv() => match command {
                Some(Outgoing::Frame(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        sink.error(ChannelError::Transport(e.to_string()));
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    let _ = write.close().await;
                    break;
                }
            },
        }
    }

    sink.close();
}
