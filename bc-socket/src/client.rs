//! Channel client: drives a [`ChannelSession`] on a single tokio task.
//!
//! All transitions happen sequentially on the driver task. Transport events,
//! the reconnect timer and the heartbeat timer are the only sources of
//! input; both timers are owned by the driver loop and are dropped with it,
//! so every exit path cancels them.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, warn};

use bc_core::constants::HEARTBEAT_FRAME;

use crate::endpoint::ChannelEndpoint;
use crate::error::ChannelError;
use crate::events::{ChannelHandler, ChannelState, ChannelStatus};
use crate::gate::DeliveryGate;
use crate::options::ChannelOptions;
use crate::state::{ChannelSession, Effect, Generation, Input};
use crate::transport::{StaticToken, TokenProvider, Transport, TransportFactory, TransportSink};

/// Configures and starts channel sessions.
pub struct ChannelClient<F> {
    endpoint: ChannelEndpoint,
    transport: Arc<F>,
    options: ChannelOptions,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl<F: TransportFactory> ChannelClient<F> {
    /// Create a client for `endpoint` using `transport` to open connections.
    pub fn new(endpoint: ChannelEndpoint, transport: F) -> Self {
        Self {
            endpoint,
            transport: Arc::new(transport),
            options: ChannelOptions::default(),
            tokens: None,
        }
    }

    /// Set custom channel options.
    pub fn with_options(mut self, options: ChannelOptions) -> Self {
        self.options = options;
        self
    }

    /// Read the credential from `provider` before every attempt instead of
    /// reusing the construction credential.
    pub fn with_token_provider(mut self, provider: impl TokenProvider) -> Self {
        self.tokens = Some(Arc::new(provider));
        self
    }

    /// Start a session and return its disposer.
    ///
    /// An empty `credential` or a missing tokio runtime yields an inert
    /// handle: nothing connects and no callback ever fires.
    pub fn start<H: ChannelHandler>(self, credential: &str, handler: H) -> ChannelHandle {
        if credential.trim().is_empty() {
            warn!("no credential for push channel, not connecting");
            return ChannelHandle::inert();
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("push channel needs a tokio runtime: {e}");
                return ChannelHandle::inert();
            }
        };

        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(StaticToken::new(credential)));
        let gate = Arc::new(DeliveryGate::new());
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ChannelStatus::idle());

        let driver = Driver {
            session: ChannelSession::new(&self.options),
            endpoint: self.endpoint,
            transport: self.transport,
            tokens,
            handler: Box::new(handler),
            gate: gate.clone(),
            input_tx: input_tx.clone(),
            input_rx,
            status_tx,
            current: None,
            reconnect: None,
            heartbeat: None,
        };

        let _ = input_tx.send(Input::Start);
        let task = runtime.spawn(driver.run());

        ChannelHandle {
            inner: Some(HandleInner { gate, input_tx, task }),
            status: status_rx,
        }
    }
}

/// Start a channel with the default client wiring.
pub fn open_channel<F, H>(
    endpoint: ChannelEndpoint,
    credential: &str,
    handler: H,
    options: ChannelOptions,
    transport: F,
) -> ChannelHandle
where
    F: TransportFactory,
    H: ChannelHandler,
{
    ChannelClient::new(endpoint, transport)
        .with_options(options)
        .start(credential, handler)
}

struct HandleInner {
    gate: Arc<DeliveryGate>,
    input_tx: mpsc::UnboundedSender<Input>,
    task: JoinHandle<()>,
}

/// Owner's handle to a running session. Dropping it disposes the session.
pub struct ChannelHandle {
    inner: Option<HandleInner>,
    status: watch::Receiver<ChannelStatus>,
}

impl ChannelHandle {
    fn inert() -> Self {
        let (_, status) = watch::channel(ChannelStatus::idle());
        Self { inner: None, status }
    }

    /// Permanently shut the session down.
    ///
    /// Idempotent and non-blocking apart from waiting out a callback that is
    /// already running on another thread. Once it returns, neither callback
    /// fires again.
    pub fn dispose(&self) {
        if let Some(inner) = &self.inner {
            inner.gate.close();
            let _ = inner.input_tx.send(Input::Dispose);
        }
    }

    /// Whether `dispose()` was called, or the handle is inert.
    pub fn is_disposed(&self) -> bool {
        self.inner.as_ref().map_or(true, |inner| inner.gate.is_closed())
    }

    /// Whether this handle never started a session.
    pub fn is_inert(&self) -> bool {
        self.inner.is_none()
    }

    /// Latest published status.
    pub fn status(&self) -> ChannelStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> ChannelState {
        self.status.borrow().state
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    /// Whether the driver task has exited.
    pub fn is_finished(&self) -> bool {
        self.inner.as_ref().map_or(true, |inner| inner.task.is_finished())
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("inert", &self.is_inert())
            .field("status", &*self.status.borrow())
            .finish()
    }
}

struct Driver<F> {
    session: ChannelSession,
    endpoint: ChannelEndpoint,
    transport: Arc<F>,
    tokens: Arc<dyn TokenProvider>,
    handler: Box<dyn ChannelHandler>,
    gate: Arc<DeliveryGate>,
    input_tx: mpsc::UnboundedSender<Input>,
    input_rx: mpsc::UnboundedReceiver<Input>,
    status_tx: watch::Sender<ChannelStatus>,
    /// The single live transport handle and its generation.
    current: Option<(Generation, Box<dyn Transport>)>,
    reconnect: Option<(Pin<Box<Sleep>>, Generation)>,
    heartbeat: Option<(Interval, Generation)>,
}

impl<F: TransportFactory> Driver<F> {
    async fn run(mut self) {
        loop {
            let input = tokio::select! {
                biased;
                input = self.input_rx.recv() => input.unwrap_or(Input::Dispose),
                generation = reconnect_due(&mut self.reconnect) => Input::ReconnectDue(generation),
                generation = heartbeat_due(&mut self.heartbeat) => Input::HeartbeatDue(generation),
            };
            // Disposal wins over anything queued ahead of it.
            let input = if self.gate.is_closed() { Input::Dispose } else { input };

            let effects = self.session.handle(input);
            // Effects never touch the session; publish first so a connect
            // still waiting on its credential is visible.
            self.publish();
            for effect in effects {
                self.apply(effect).await;
            }

            if self.session.state() == ChannelState::Disposed {
                break;
            }
        }
        debug!("channel driver stopped");
    }

    fn publish(&self) {
        let status = self.session.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    async fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Connect { generation, attempt } => self.connect(generation, attempt).await,
            Effect::StartHeartbeat { generation, interval } => {
                let mut ticker = interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.heartbeat = Some((ticker, generation));
            }
            Effect::StopHeartbeat => self.heartbeat = None,
            Effect::SendHeartbeat { generation } => match &self.current {
                Some((live, transport)) if *live == generation => {
                    if let Err(e) = transport.send(HEARTBEAT_FRAME) {
                        // The close that follows drives reconnection.
                        debug!("heartbeat send failed: {e}");
                    } else {
                        debug!("heartbeat sent on connection #{generation}");
                    }
                }
                _ => {}
            },
            Effect::ScheduleReconnect { generation, delay, attempt } => {
                warn!(
                    "channel reconnect attempt {attempt} in {:.1}s",
                    delay.as_secs_f64()
                );
                self.reconnect = Some((Box::pin(sleep(delay)), generation));
            }
            Effect::CancelReconnect => self.reconnect = None,
            Effect::CloseTransport => {
                if let Some((generation, transport)) = self.current.take() {
                    debug!("closing connection #{generation}");
                    transport.close();
                }
            }
            Effect::DeliverMessage(payload) => {
                let handler = &self.handler;
                self.gate.deliver(|| handler.on_message(payload));
            }
            Effect::DeliverError(err) => {
                let handler = &self.handler;
                self.gate.deliver(|| handler.on_error(&err));
            }
        }
    }

    async fn connect(&mut self, generation: Generation, attempt: u32) {
        if self.gate.is_closed() {
            return;
        }
        // A provider that never answers must not hold up disposal.
        let token = tokio::select! {
            biased;
            _ = self.gate.closed() => return,
            token = self.tokens.token() => token.filter(|t| !t.trim().is_empty()),
        };
        if self.gate.is_closed() {
            return;
        }
        let Some(token) = token else {
            warn!("no credential for channel attempt {attempt}, counting it as failed");
            let _ = self
                .input_tx
                .send(Input::TransportError(generation, ChannelError::MissingCredential));
            let _ = self.input_tx.send(Input::Closed(generation));
            return;
        };

        if let Some((stale, transport)) = self.current.take() {
            warn!("closing leftover connection #{stale} before opening #{generation}");
            transport.close();
        }

        info!(
            "channel connecting to {} (attempt {attempt})",
            self.endpoint.base_address()
        );
        let url = self.endpoint.url_for(&token);
        let sink = TransportSink::new(generation, self.input_tx.clone());
        let transport = self.transport.open(&url, sink);
        self.current = Some((generation, transport));
    }
}

impl<F> Drop for Driver<F> {
    fn drop(&mut self) {
        if let Some((_, transport)) = self.current.take() {
            transport.close();
        }
    }
}

async fn reconnect_due(timer: &mut Option<(Pin<Box<Sleep>>, Generation)>) -> Generation {
    match timer {
        Some((sleep, generation)) => {
            sleep.as_mut().await;
            let generation = *generation;
            *timer = None;
            generation
        }
        None => pending().await,
    }
}

async fn heartbeat_due(timer: &mut Option<(Interval, Generation)>) -> Generation {
    match timer {
        Some((ticker, generation)) => {
            ticker.tick().await;
            *generation
        }
        None => pending().await,
    }
}

