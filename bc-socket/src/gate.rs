//! Callback gate guaranteeing silence after disposal.
//!
//! Owner callbacks run under the gate's lock. Closing the gate flips the flag
//! and then waits for any in-flight callback to finish, so once `close`
//! returns no callback is running or will start. A callback that disposes
//! its own channel does not wait on itself.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::Notify;

static NEXT_GATE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Gate whose callback is executing on this thread, if any.
    static DELIVERING: Cell<u64> = const { Cell::new(0) };
}

pub(crate) struct DeliveryGate {
    id: u64,
    closed: AtomicBool,
    lock: Mutex<()>,
    on_close: Notify,
}

/// Restores the previous delivering gate on drop, including on panic.
struct Restore(u64);

impl Drop for Restore {
    fn drop(&mut self) {
        DELIVERING.with(|d| d.set(self.0));
    }
}

impl DeliveryGate {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_GATE_ID.fetch_add(1, Ordering::Relaxed),
            closed: AtomicBool::new(false),
            lock: Mutex::new(()),
            on_close: Notify::new(),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolve once the gate is closed.
    pub(crate) async fn closed(&self) {
        let notified = self.on_close.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    /// Run `f` unless the gate is closed. Returns whether it ran.
    pub(crate) fn deliver(&self, f: impl FnOnce()) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return false;
        }
        let _restore = Restore(DELIVERING.with(|d| d.replace(self.id)));
        f();
        true
    }

    /// Close the gate and wait out an in-flight callback.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.on_close.notify_waiters();
        let reentrant = DELIVERING.with(|d| d.get() == self.id);
        if !reentrant {
            drop(self.lock.lock().unwrap_or_else(PoisonError::into_inner));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_deliver_until_closed() {
        let gate = DeliveryGate::new();
        let mut calls = 0;
        assert!(gate.deliver(|| calls += 1));
        gate.close();
        assert!(!gate.deliver(|| calls += 1));
        assert_eq!(calls, 1);
        gate.close();
        assert!(gate.is_closed());
    }

    #[tokio::test]
    async fn test_closed_resolves_on_close() {
        let gate = Arc::new(DeliveryGate::new());
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.closed().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        gate.close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        // Already closed: resolves immediately.
        gate.closed().await;
    }

    #[test]
    fn test_close_from_inside_callback() {
        let gate = DeliveryGate::new();
        assert!(gate.deliver(|| gate.close()));
        assert!(gate.is_closed());
        assert!(!gate.deliver(|| panic!("must not run")));
    }

    #[test]
    fn test_close_waits_for_in_flight_callback() {
        let gate = Arc::new(DeliveryGate::new());
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = std::sync::mpsc::channel();

        let worker = {
            let gate = gate.clone();
            let finished = finished.clone();
            std::thread::spawn(move || {
                gate.deliver(|| {
                    started_tx.send(()).unwrap();
                    std::thread::sleep(Duration::from_millis(50));
                    finished.store(true, Ordering::SeqCst);
                });
            })
        };

        started_rx.recv().unwrap();
        gate.close();
        assert!(finished.load(Ordering::SeqCst));
        worker.join().unwrap();
    }
}
