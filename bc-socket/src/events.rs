//! Channel states and owner callbacks.

use serde::Serialize;

use crate::error::ChannelError;

/// Lifecycle state of a channel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Never connected.
    Idle,
    /// A transport is being opened.
    Connecting,
    /// The transport is open and delivering frames.
    Open,
    /// The transport closed; a reconnect may be pending.
    Closed,
    /// The retry budget is spent; no further attempts.
    Exhausted,
    /// Shut down by the owner; absorbing.
    Disposed,
}

impl ChannelState {
    /// Whether no further connection attempt can happen from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Disposed)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// Observable snapshot of a channel session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStatus {
    pub state: ChannelState,
    /// Attempts made since the last successful open.
    pub attempt_count: u32,
    /// Most recent transport error, cleared on a successful open.
    pub last_error: Option<ChannelError>,
}

impl ChannelStatus {
    pub fn idle() -> Self {
        Self {
            state: ChannelState::Idle,
            attempt_count: 0,
            last_error: None,
        }
    }
}

/// Receives the channel's output.
///
/// Both methods run on the channel's driver task and should return quickly.
/// Neither is ever invoked once `dispose()` has returned.
pub trait ChannelHandler: Send + 'static {
    /// One successfully parsed inbound frame.
    fn on_message(&self, payload: serde_json::Value);

    /// A transport-level error. The channel recovers on its own.
    fn on_error(&self, error: &ChannelError);
}

/// Closure-pair adapter for [`ChannelHandler`].
pub struct FnHandler<M, E> {
    on_message: M,
    on_error: E,
}

/// Build a handler from a message closure and an error closure.
pub fn handler<M, E>(on_message: M, on_error: E) -> FnHandler<M, E>
where
    M: Fn(serde_json::Value) + Send + 'static,
    E: Fn(&ChannelError) + Send + 'static,
{
    FnHandler { on_message, on_error }
}

impl<M, E> ChannelHandler for FnHandler<M, E>
where
    M: Fn(serde_json::Value) + Send + 'static,
    E: Fn(&ChannelError) + Send + 'static,
{
    fn on_message(&self, payload: serde_json::Value) {
        (self.on_message)(payload)
    }

    fn on_error(&self, error: &ChannelError) {
        (self.on_error)(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_state_display() {
        assert_eq!(ChannelState::Open.to_string(), "open");
        assert_eq!(ChannelState::Exhausted.to_string(), "exhausted");
    }

    #[test]
    fn test_terminal_states() {
        assert!(ChannelState::Disposed.is_terminal());
        assert!(ChannelState::Exhausted.is_terminal());
        assert!(!ChannelState::Closed.is_terminal());
    }

    #[test]
    fn test_fn_handler_forwards() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let h = {
            let messages = messages.clone();
            let errors = errors.clone();
            handler(
                move |v| messages.lock().unwrap().push(v),
                move |e: &ChannelError| errors.lock().unwrap().push(e.clone()),
            )
        };

        h.on_message(serde_json::json!({"id": 1}));
        h.on_error(&ChannelError::Transport("reset".into()));

        assert_eq!(messages.lock().unwrap()[0]["id"], 1);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }
}
