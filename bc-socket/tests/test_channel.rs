//! End-to-end channel behavior against a scripted transport, in virtual time.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bc_core::constants::HEARTBEAT_FRAME;
use bc_socket::{
    ChannelClient, ChannelError, ChannelHandle, ChannelHandler, ChannelOptions, ChannelState,
    TokenProvider,
};
use common::{
    quiet_options, settle, test_endpoint, wait_for_state, Recorder, ScriptedTransport, Step,
};
use serde_json::{json, Value};

fn start(
    transport: &ScriptedTransport,
    options: ChannelOptions,
    credential: &str,
    recorder: &Recorder,
) -> ChannelHandle {
    ChannelClient::new(test_endpoint(), transport.clone())
        .with_options(options)
        .start(credential, recorder.clone())
}

#[tokio::test(start_paused = true)]
async fn test_three_failures_then_success() {
    let transport = ScriptedTransport::new([Step::Fail, Step::Fail, Step::Fail, Step::Open]);
    let recorder = Recorder::default();
    let handle = start(&transport, quiet_options(), "abc123", &recorder);

    wait_for_state(&handle, ChannelState::Open).await;

    assert_eq!(transport.attempt_count(), 4);
    assert_eq!(transport.gaps_ms(), vec![1000, 2000, 4000]);
    assert_eq!(handle.status().attempt_count, 0);
    assert!(handle.status().last_error.is_none());
    assert_eq!(
        transport.attempt(0).url,
        "wss://api.example.com/ws/notifications/?token=abc123"
    );
    assert_eq!(recorder.errors().len(), 3);
    assert!(recorder.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_backoff_resets_after_open() {
    let transport = ScriptedTransport::new([Step::Open, Step::Fail, Step::Open, Step::Open]);
    let recorder = Recorder::default();
    let handle = start(&transport, quiet_options(), "abc123", &recorder);

    wait_for_state(&handle, ChannelState::Open).await;
    transport.attempt(0).sink.close();
    transport.wait_for_attempts(3).await;
    wait_for_state(&handle, ChannelState::Open).await;

    // The count restarted at the open, so both waits are the initial delay.
    assert_eq!(transport.gaps_ms(), vec![1000, 1000]);

    transport.attempt(2).sink.close();
    transport.wait_for_attempts(4).await;
    assert_eq!(transport.gaps_ms()[2], 1000);
}

#[tokio::test(start_paused = true)]
async fn test_delay_is_capped() {
    let transport = ScriptedTransport::new([Step::Fail; 8]);
    let recorder = Recorder::default();
    let options = quiet_options().with_max_delay(Duration::from_millis(5000));
    let _handle = start(&transport, options, "abc123", &recorder);

    transport.wait_for_attempts(7).await;
    assert_eq!(
        transport.gaps_ms()[..6].to_vec(),
        vec![1000, 2000, 4000, 5000, 5000, 5000]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dispose_while_connecting() {
    let transport = ScriptedTransport::new([Step::Hang]);
    let recorder = Recorder::default();
    let handle = start(&transport, quiet_options(), "abc123", &recorder);

    transport.wait_for_attempts(1).await;
    assert_eq!(handle.state(), ChannelState::Connecting);

    handle.dispose();
    settle().await;
    assert!(transport.attempt(0).is_closed());
    assert_eq!(handle.state(), ChannelState::Disposed);

    // The late outcome of the abandoned attempt goes nowhere.
    let late = transport.attempt(0).sink;
    late.open();
    late.message(r#"{"id":1}"#);
    late.close();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(transport.attempt_count(), 1);
    assert!(recorder.is_silent());
    assert!(handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_dispose_is_idempotent() {
    let transport = ScriptedTransport::new([Step::Open]);
    let recorder = Recorder::default();
    let handle = start(&transport, quiet_options(), "abc123", &recorder);
    wait_for_state(&handle, ChannelState::Open).await;

    handle.dispose();
    handle.dispose();
    settle().await;
    handle.dispose();

    assert!(handle.is_disposed());
    assert_eq!(handle.state(), ChannelState::Disposed);
    assert!(transport.attempt(0).is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_dispose_cancels_pending_reconnect() {
    let transport = ScriptedTransport::new([Step::Fail, Step::Open]);
    let recorder = Recorder::default();
    let handle = start(&transport, quiet_options(), "abc123", &recorder);

    transport.wait_for_attempts(1).await;
    settle().await;
    assert_eq!(handle.state(), ChannelState::Closed);

    handle.dispose();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_disposes() {
    let transport = ScriptedTransport::new([Step::Open]);
    let recorder = Recorder::default();
    let handle = start(&transport, quiet_options(), "abc123", &recorder);
    wait_for_state(&handle, ChannelState::Open).await;

    drop(handle);
    settle().await;
    assert!(transport.attempt(0).is_closed());

    transport.attempt(0).sink.message(r#"{"id":1}"#);
    settle().await;
    assert!(recorder.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_messages_and_malformed_frames() {
    let transport = ScriptedTransport::new([Step::Open]);
    let recorder = Recorder::default();
    let handle = start(&transport, quiet_options(), "abc123", &recorder);
    wait_for_state(&handle, ChannelState::Open).await;

    let sink = transport.attempt(0).sink;
    sink.message(r#"{"id":1,"title":"Hello"}"#);
    sink.message("not json {");
    sink.message(r#"{"id":2}"#);
    settle().await;

    let ids: Vec<i64> = recorder
        .messages()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(recorder.errors().is_empty());
    assert_eq!(handle.state(), ChannelState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_while_open_is_reported() {
    let transport = ScriptedTransport::new([Step::Open]);
    let recorder = Recorder::default();
    let handle = start(&transport, quiet_options(), "abc123", &recorder);
    wait_for_state(&handle, ChannelState::Open).await;

    transport
        .attempt(0)
        .sink
        .error(ChannelError::Transport("connection reset".into()));
    settle().await;

    assert_eq!(
        recorder.errors(),
        vec![ChannelError::Transport("connection reset".into())]
    );
    assert_eq!(handle.state(), ChannelState::Open);
    assert!(handle.status().last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_empty_credential_is_inert() {
    let transport = ScriptedTransport::new([Step::Open]);
    let recorder = Recorder::default();
    let handle = start(&transport, quiet_options(), "", &recorder);

    assert!(handle.is_inert());
    handle.dispose();
    handle.dispose();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(transport.attempt_count(), 0);
    assert!(recorder.is_silent());
    assert_eq!(handle.state(), ChannelState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_only_while_open() {
    let transport = ScriptedTransport::new([Step::Hang]);
    let recorder = Recorder::default();
    let options = ChannelOptions::default().with_heartbeat_interval(Duration::from_secs(20));
    let handle = start(&transport, options, "abc123", &recorder);

    transport.wait_for_attempts(1).await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(transport.attempt(0).sent().is_empty());

    transport.attempt(0).sink.open();
    wait_for_state(&handle, ChannelState::Open).await;
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(transport.attempt(0).sent(), vec![HEARTBEAT_FRAME; 3]);

    // Closed and reconnecting: the heartbeat stops with the connection.
    transport.attempt(0).sink.close();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempt(0).sent().len(), 3);
    assert!(transport.attempt(1).sent().is_empty());

    handle.dispose();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(transport.attempt(1).sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted() {
    let transport = ScriptedTransport::new([Step::Fail; 6]);
    let recorder = Recorder::default();
    let options = quiet_options().with_max_retries(3);
    let handle = start(&transport, options, "abc123", &recorder);

    wait_for_state(&handle, ChannelState::Exhausted).await;
    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(transport.attempt_count(), 3);
    assert_eq!(transport.gaps_ms(), vec![1000, 2000]);
    assert_eq!(recorder.errors().len(), 3);

    // Still disposable.
    handle.dispose();
    settle().await;
    assert_eq!(handle.state(), ChannelState::Disposed);
}

#[tokio::test(start_paused = true)]
async fn test_stale_connection_events_are_ignored() {
    let transport = ScriptedTransport::new([Step::Open, Step::Open]);
    let recorder = Recorder::default();
    let handle = start(&transport, quiet_options(), "abc123", &recorder);
    wait_for_state(&handle, ChannelState::Open).await;

    let first = transport.attempt(0).sink;
    first.close();
    transport.wait_for_attempts(2).await;
    wait_for_state(&handle, ChannelState::Open).await;

    first.message(r#"{"id":99}"#);
    first.error(ChannelError::Transport("late".into()));
    first.close();
    settle().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(handle.state(), ChannelState::Open);
    assert_eq!(transport.attempt_count(), 2);
    assert!(recorder.is_silent());
}

struct RotatingToken(AtomicUsize);

#[async_trait]
impl TokenProvider for RotatingToken {
    async fn token(&self) -> Option<String> {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Some(format!("t{n}"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_token_read_per_attempt() {
    let transport = ScriptedTransport::new([Step::Fail, Step::Open]);
    let recorder = Recorder::default();
    let handle = ChannelClient::new(test_endpoint(), transport.clone())
        .with_options(quiet_options())
        .with_token_provider(RotatingToken(AtomicUsize::new(0)))
        .start("initial", recorder.clone());

    wait_for_state(&handle, ChannelState::Open).await;
    let urls: Vec<String> = transport.attempts().into_iter().map(|a| a.url).collect();
    assert!(urls[0].ends_with("?token=t1"));
    assert!(urls[1].ends_with("?token=t2"));
}

struct DisposeOnMessage {
    handle: Arc<Mutex<Option<ChannelHandle>>>,
    seen: Arc<Mutex<Vec<Value>>>,
}

impl ChannelHandler for DisposeOnMessage {
    fn on_message(&self, payload: Value) {
        self.seen.lock().unwrap().push(payload);
        if let Some(handle) = self.handle.lock().unwrap().as_ref() {
            handle.dispose();
        }
    }

    fn on_error(&self, _error: &ChannelError) {}
}

#[tokio::test(start_paused = true)]
async fn test_dispose_from_inside_callback() {
    let transport = ScriptedTransport::new([Step::Open]);
    let slot = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = DisposeOnMessage {
        handle: slot.clone(),
        seen: seen.clone(),
    };
    let handle = ChannelClient::new(test_endpoint(), transport.clone())
        .with_options(quiet_options())
        .start("abc123", handler);
    let mut status = handle.subscribe();
    *slot.lock().unwrap() = Some(handle);

    status
        .wait_for(|s| s.state == ChannelState::Open)
        .await
        .unwrap();
    let sink = transport.attempt(0).sink;
    sink.message(&json!({"id": 1}).to_string());
    sink.message(&json!({"id": 2}).to_string());
    settle().await;

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(transport.attempt(0).is_closed());
    assert_eq!(status.borrow().state, ChannelState::Disposed);
}

#[tokio::test(start_paused = true)]
async fn test_open_channel_with_closure_handler() {
    let transport = ScriptedTransport::new([Step::Open]);
    let titles = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(AtomicUsize::new(0));

    let handle = {
        let titles = titles.clone();
        let errors = errors.clone();
        bc_socket::open_channel(
            test_endpoint(),
            "abc123",
            bc_socket::handler(
                move |payload: Value| {
                    let title = payload["title"].as_str().unwrap_or_default().to_string();
                    titles.lock().unwrap().push(title);
                },
                move |_: &ChannelError| {
                    errors.fetch_add(1, Ordering::SeqCst);
                },
            ),
            quiet_options(),
            transport.clone(),
        )
    };
    wait_for_state(&handle, ChannelState::Open).await;

    let sink = transport.attempt(0).sink;
    sink.message(r#"{"id":1,"title":"Deploy finished"}"#);
    sink.error(ChannelError::Transport("hiccup".into()));
    settle().await;

    handle.dispose();
    sink.message(r#"{"id":2,"title":"too late"}"#);
    sink.error(ChannelError::Transport("too late".into()));
    settle().await;

    assert_eq!(*titles.lock().unwrap(), vec!["Deploy finished".to_string()]);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

/// Has no credential for the first attempt, then a fixed one.
struct LateToken(AtomicUsize);

#[async_trait]
impl TokenProvider for LateToken {
    async fn token(&self) -> Option<String> {
        match self.0.fetch_add(1, Ordering::SeqCst) {
            0 => None,
            _ => Some("late".into()),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_missing_token_is_reported_and_retried() {
    let transport = ScriptedTransport::new([Step::Open]);
    let recorder = Recorder::default();
    let started = tokio::time::Instant::now();
    let handle = ChannelClient::new(test_endpoint(), transport.clone())
        .with_options(quiet_options())
        .with_token_provider(LateToken(AtomicUsize::new(0)))
        .start("initial", recorder.clone());

    wait_for_state(&handle, ChannelState::Open).await;

    assert_eq!(recorder.errors(), vec![ChannelError::MissingCredential]);
    assert_eq!(transport.attempt_count(), 1);
    assert!(transport.attempt(0).url.ends_with("?token=late"));
    assert_eq!(transport.attempt(0).at - started, Duration::from_millis(1_000));
}

/// A credential lookup that never completes.
struct StuckToken;

#[async_trait]
impl TokenProvider for StuckToken {
    async fn token(&self) -> Option<String> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_dispose_while_token_lookup_is_stuck() {
    let transport = ScriptedTransport::new([Step::Open]);
    let recorder = Recorder::default();
    let handle = ChannelClient::new(test_endpoint(), transport.clone())
        .with_options(quiet_options())
        .with_token_provider(StuckToken)
        .start("initial", recorder.clone());

    wait_for_state(&handle, ChannelState::Connecting).await;
    settle().await;

    handle.dispose();
    wait_for_state(&handle, ChannelState::Disposed).await;
    settle().await;

    assert!(handle.is_finished());
    assert_eq!(transport.attempt_count(), 0);
    assert!(recorder.is_silent());
}
