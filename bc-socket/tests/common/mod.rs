//! Shared test utilities for channel integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bc_socket::{
    ChannelEndpoint, ChannelError, ChannelHandle, ChannelHandler, ChannelOptions, ChannelState,
    Transport, TransportFactory, TransportSink,
};
use serde_json::Value;
use tokio::time::Instant;

pub const BASE_ADDRESS: &str = "https://api.example.com/";
pub const CHANNEL_PATH: &str = "ws/notifications";

/// What the scripted transport does with the next open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Report a connect error followed by a close.
    Fail,
    /// Report a successful open.
    Open,
    /// Report nothing; the attempt stays pending.
    Hang,
}

/// One recorded open request.
#[derive(Clone)]
pub struct Attempt {
    pub url: String,
    pub at: Instant,
    pub sink: TransportSink,
    pub sent: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl Attempt {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Transport factory that follows a fixed plan and records every attempt.
///
/// Once the plan runs out every further attempt hangs.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    plan: Arc<Mutex<VecDeque<Step>>>,
    attempts: Arc<Mutex<Vec<Attempt>>>,
}

impl ScriptedTransport {
    pub fn new(plan: impl IntoIterator<Item = Step>) -> Self {
        Self {
            plan: Arc::new(Mutex::new(plan.into_iter().collect())),
            attempts: Arc::default(),
        }
    }

    /// Queue more steps.
    pub fn then(&self, step: Step) {
        self.plan.lock().unwrap().push_back(step);
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempt(&self, index: usize) -> Attempt {
        self.attempts.lock().unwrap()[index].clone()
    }

    /// Gaps between consecutive attempts, in milliseconds.
    pub fn gaps_ms(&self) -> Vec<u128> {
        self.attempts()
            .windows(2)
            .map(|w| (w[1].at - w[0].at).as_millis())
            .collect()
    }

    /// Wait (in virtual time) until at least `n` attempts were made.
    pub async fn wait_for_attempts(&self, n: usize) {
        for _ in 0..100_000 {
            if self.attempt_count() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("only {} of {n} attempts were made", self.attempt_count());
    }
}

impl TransportFactory for ScriptedTransport {
    fn open(&self, url: &str, sink: TransportSink) -> Box<dyn Transport> {
        let step = self.plan.lock().unwrap().pop_front().unwrap_or(Step::Hang);
        let attempt = Attempt {
            url: url.to_string(),
            at: Instant::now(),
            sink: sink.clone(),
            sent: Arc::default(),
            closed: Arc::default(),
        };
        let connection = ScriptedConnection {
            sent: attempt.sent.clone(),
            closed: attempt.closed.clone(),
        };
        self.attempts.lock().unwrap().push(attempt);

        match step {
            Step::Fail => {
                sink.error(ChannelError::Connect("connection refused".into()));
                sink.close();
            }
            Step::Open => sink.open(),
            Step::Hang => {}
        }
        Box::new(connection)
    }
}

struct ScriptedConnection {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl Transport for ScriptedConnection {
    fn send(&self, frame: &str) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Send("closed".into()));
        }
        self.sent.lock().unwrap().push(frame.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Handler that records everything it receives.
#[derive(Clone, Default)]
pub struct Recorder {
    pub messages: Arc<Mutex<Vec<Value>>>,
    pub errors: Arc<Mutex<Vec<ChannelError>>>,
}

impl Recorder {
    pub fn messages(&self) -> Vec<Value> {
        self.messages.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<ChannelError> {
        self.errors.lock().unwrap().clone()
    }

    pub fn is_silent(&self) -> bool {
        self.messages.lock().unwrap().is_empty() && self.errors.lock().unwrap().is_empty()
    }
}

impl ChannelHandler for Recorder {
    fn on_message(&self, payload: Value) {
        self.messages.lock().unwrap().push(payload);
    }

    fn on_error(&self, error: &ChannelError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

pub fn test_endpoint() -> ChannelEndpoint {
    ChannelEndpoint::new(BASE_ADDRESS, CHANNEL_PATH)
}

/// Options with the default backoff and no heartbeat.
pub fn quiet_options() -> ChannelOptions {
    ChannelOptions::default().without_heartbeat()
}

/// Wait (in virtual time) until the handle reports `state`.
pub async fn wait_for_state(handle: &ChannelHandle, state: ChannelState) {
    let mut rx = handle.subscribe();
    let waited = tokio::time::timeout(
        Duration::from_secs(3600),
        rx.wait_for(|status| status.state == state),
    )
    .await;
    match waited {
        Ok(Ok(_)) => {}
        _ => panic!("channel never reached {state}; now {}", handle.state()),
    }
}

/// Let the driver drain whatever is queued without advancing far.
pub async fn settle() {
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
