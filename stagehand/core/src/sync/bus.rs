//! Capturing Event Bus
//!
//! Publish/subscribe with fire-before-subscribe replay. Waiting is
//! future-based: [`EventBus::wait_for`] resolves when the event fires, or
//! immediately if the event was captured and has already fired.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

/// A capturing publish/subscribe event bus.
///
/// Cloning produces another handle to the same bus.
#[derive(Clone, Debug, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

#[derive(Debug, Default)]
struct BusInner {
    /// One-shot waiters per event name.
    waiters: HashMap<String, Vec<oneshot::Sender<()>>>,
    /// Events marked for capture on their next firing.
    to_capture: HashSet<String>,
    /// Events that fired while marked, not yet consumed by a waiter.
    captured: HashSet<String>,
}

impl EventBus {
    /// Create a new, empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire an event, waking every current waiter.
    ///
    /// If the event is marked for capture, the firing is also stored so a
    /// late waiter still observes it.
    pub fn fire(&self, event: &str) {
        let senders = {
            let mut inner = self.inner.lock();
            if inner.to_capture.contains(event) {
                inner.captured.insert(event.to_string());
            }
            inner.waiters.remove(event).unwrap_or_default()
        };

        trace!(event, waiters = senders.len(), "event fired");
        for sender in senders {
            // A waiter that gave up is not an error.
            let _ = sender.send(());
        }
    }

    /// Mark an event so its next firing is stored for replay.
    pub fn capture(&self, event: &str) {
        self.inner.lock().to_capture.insert(event.to_string());
    }

    /// Stop capturing an event and discard any stored, unconsumed firing.
    ///
    /// Session teardown calls this for every event it captured; a stored
    /// firing must not leak into the next session.
    pub fn release_capture(&self, event: &str) {
        let mut inner = self.inner.lock();
        inner.to_capture.remove(event);
        inner.captured.remove(event);
    }

    /// Wait for the next firing of an event.
    ///
    /// If the event was captured and has already fired, the stored firing is
    /// consumed and this resolves immediately. Consuming also releases the
    /// capture mark.
    pub async fn wait_for(&self, event: &str) {
        let receiver = {
            let mut inner = self.inner.lock();
            inner.to_capture.remove(event);
            if inner.captured.remove(event) {
                trace!(event, "replaying captured event");
                None
            } else {
                let (tx, rx) = oneshot::channel();
                inner.waiters.entry(event.to_string()).or_default().push(tx);
                Some(rx)
            }
        };

        if let Some(rx) = receiver {
            // A dropped sender means the bus side was torn down; resolve
            // rather than hang.
            let _ = rx.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fire_then_wait_without_capture_would_miss() {
        let bus = EventBus::new();
        bus.fire("ready");

        // Not captured, so the firing is gone; a fresh fire is needed.
        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.wait_for("ready").await })
        };
        tokio::task::yield_now().await;
        bus.fire("ready");
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn captured_event_replays_to_late_waiter() {
        let bus = EventBus::new();
        bus.capture("ready");
        bus.fire("ready");

        // Must resolve immediately instead of hanging.
        bus.wait_for("ready").await;
    }

    #[tokio::test]
    async fn capture_is_one_shot() {
        let bus = EventBus::new();
        bus.capture("ready");
        bus.fire("ready");
        bus.fire("ready");

        bus.wait_for("ready").await;

        // Second wait needs a live firing again.
        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.wait_for("ready").await })
        };
        tokio::task::yield_now().await;
        bus.fire("ready");
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn release_capture_discards_stored_firing() {
        let bus = EventBus::new();
        bus.capture("ready");
        bus.fire("ready");
        bus.release_capture("ready");

        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.wait_for("ready").await })
        };
        tokio::task::yield_now().await;
        bus.fire("ready");
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn fire_wakes_all_waiters() {
        let bus = EventBus::new();
        let a = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.wait_for("advance").await })
        };
        let b = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.wait_for("advance").await })
        };
        tokio::task::yield_now().await;
        bus.fire("advance");
        a.await.unwrap();
        b.await.unwrap();
    }
}
