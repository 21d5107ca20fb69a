//! Pure connection state machine for a channel session.
//!
//! [`ChannelSession::handle`] maps `(state, input)` to `(state, effects)`
//! without touching timers or sockets; the driver in [`crate::client`]
//! performs the returned effects. Each connection attempt is numbered with a
//! generation, and inputs carrying any other generation are stale and
//! ignored.
//!
//! ```text
//! Idle --Start--> Connecting --Opened--> Open
//!                    |                     |
//!                    +-------Closed--------+--> Closed --ReconnectDue--> Connecting
//!                                                  |
//!                                                  +--> Exhausted (retry budget spent)
//! any --Dispose--> Disposed
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::error::ChannelError;
use crate::events::{ChannelState, ChannelStatus};
use crate::options::ChannelOptions;

/// Number of a connection attempt within a session.
pub type Generation = u64;

/// What the owner wants the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Active,
    Disposed,
}

/// Everything that can happen to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Begin the first connection attempt.
    Start,
    /// The transport of `generation` opened.
    Opened(Generation),
    /// The transport of `generation` delivered a text frame.
    Frame(Generation, String),
    /// The transport of `generation` reported an error.
    TransportError(Generation, ChannelError),
    /// The transport of `generation` closed, or its attempt failed.
    Closed(Generation),
    /// The reconnect wait scheduled after `generation` closed has elapsed.
    ReconnectDue(Generation),
    /// A heartbeat period elapsed while `generation` was open.
    HeartbeatDue(Generation),
    /// Permanent shutdown.
    Dispose,
}

/// Side effects the driver must perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Read a credential and open a transport for `generation`.
    Connect { generation: Generation, attempt: u32 },
    StartHeartbeat { generation: Generation, interval: Duration },
    StopHeartbeat,
    /// Send the keepalive frame over the transport of `generation`.
    SendHeartbeat { generation: Generation },
    /// Wake up with `ReconnectDue(generation)` after `delay`.
    ScheduleReconnect {
        generation: Generation,
        delay: Duration,
        attempt: u32,
    },
    CancelReconnect,
    /// Close and release the current transport handle, if any.
    CloseTransport,
    DeliverMessage(serde_json::Value),
    DeliverError(ChannelError),
}

/// The logical, long-lived subscription.
#[derive(Debug, Clone)]
pub struct ChannelSession {
    state: ChannelState,
    desired: DesiredState,
    generation: Generation,
    attempt_count: u32,
    last_error: Option<ChannelError>,
    options: ChannelOptions,
    backoff: Backoff,
}

impl ChannelSession {
    pub fn new(options: &ChannelOptions) -> Self {
        Self {
            state: ChannelState::Idle,
            desired: DesiredState::Active,
            generation: 0,
            attempt_count: 0,
            last_error: None,
            options: options.clone(),
            // Deterministic unless the options ask for jitter.
            backoff: options.backoff(),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn desired(&self) -> DesiredState {
        self.desired
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn last_error(&self) -> Option<&ChannelError> {
        self.last_error.as_ref()
    }

    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            state: self.state,
            attempt_count: self.attempt_count,
            last_error: self.last_error.clone(),
        }
    }

    /// Apply one input and return the effects to perform.
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        if self.state == ChannelState::Disposed {
            return Vec::new();
        }

        match input {
            Input::Start => {
                if self.state == ChannelState::Idle {
                    self.begin_attempt()
                } else {
                    Vec::new()
                }
            }
            Input::Opened(generation) => {
                if !self.is_current(generation) || self.state != ChannelState::Connecting {
                    debug!("ignoring open from stale connection #{generation}");
                    return Vec::new();
                }
                self.attempt_count = 0;
                self.last_error = None;
                self.transition(ChannelState::Open);
                match self.options.heartbeat() {
                    Some(interval) => vec![Effect::StartHeartbeat { generation, interval }],
                    None => Vec::new(),
                }
            }
            Input::Frame(generation, text) => {
                if !self.is_current(generation) || self.state != ChannelState::Open {
                    debug!("ignoring frame from stale connection #{generation}");
                    return Vec::new();
                }
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(payload) => vec![Effect::DeliverMessage(payload)],
                    Err(e) => {
                        warn!("dropping malformed channel frame ({} bytes): {e}", text.len());
                        Vec::new()
                    }
                }
            }
            Input::TransportError(generation, error) => {
                if !self.is_current(generation) {
                    debug!("ignoring error from stale connection #{generation}: {error}");
                    return Vec::new();
                }
                warn!("channel transport error: {error}");
                self.last_error = Some(error.clone());
                vec![Effect::DeliverError(error)]
            }
            Input::Closed(generation) => {
                let live = matches!(self.state, ChannelState::Connecting | ChannelState::Open);
                if !self.is_current(generation) || !live {
                    debug!("ignoring close from stale connection #{generation}");
                    return Vec::new();
                }
                self.transition(ChannelState::Closed);
                let mut effects = vec![Effect::StopHeartbeat, Effect::CloseTransport];

                if self.options.retries_exhausted(self.attempt_count) {
                    warn!(
                        "channel gave up after {} attempt(s), no further reconnects",
                        self.attempt_count
                    );
                    self.transition(ChannelState::Exhausted);
                    return effects;
                }

                effects.push(Effect::ScheduleReconnect {
                    generation,
                    delay: self.backoff.next_delay(self.attempt_count),
                    attempt: self.attempt_count + 1,
                });
                effects
            }
            Input::ReconnectDue(generation) => {
                if !self.is_current(generation) || self.state != ChannelState::Closed {
                    return Vec::new();
                }
                self.begin_attempt()
            }
            Input::HeartbeatDue(generation) => {
                if self.is_current(generation) && self.state == ChannelState::Open {
                    vec![Effect::SendHeartbeat { generation }]
                } else {
                    Vec::new()
                }
            }
            Input::Dispose => {
                self.desired = DesiredState::Disposed;
                self.transition(ChannelState::Disposed);
                vec![Effect::CancelReconnect, Effect::StopHeartbeat, Effect::CloseTransport]
            }
        }
    }

    fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation
    }

    fn begin_attempt(&mut self) -> Vec<Effect> {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.generation += 1;
        self.transition(ChannelState::Connecting);
        vec![Effect::Connect {
            generation: self.generation,
            attempt: self.attempt_count,
        }]
    }

    fn transition(&mut self, next: ChannelState) {
        if self.state != next {
            info!("channel state: {} -> {}", self.state, next);
            self.state = next;
        }
    }
}
