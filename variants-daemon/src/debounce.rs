//! Cancellable per-key timers.
//!
//! Scheduling a key that already has a pending timer aborts that timer and
//! starts a fresh one, so a burst of events fires once, one window after the
//! last event. Timers only deliver the key to a channel; the receiver does
//! the work, so aborting a timer never interrupts work in progress.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct Debouncer<K> {
    window: Duration,
    pending: HashMap<K, JoinHandle<()>>,
    fire_tx: mpsc::UnboundedSender<K>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    /// A debouncer firing `window` after the last event per key, plus the
    /// receiving end that yields fired keys.
    pub fn new(window: Duration) -> (Self, mpsc::UnboundedReceiver<K>) {
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        (
            Self {
                window,
                pending: HashMap::new(),
                fire_tx,
            },
            fire_rx,
        )
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Start (or restart) the timer for `key`.
    pub fn schedule(&mut self, key: K) {
        self.pending.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = self.pending.remove(&key) {
            previous.abort();
        }
        let window = self.window;
        let fire_tx = self.fire_tx.clone();
        let fired = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = fire_tx.send(fired);
        });
        self.pending.insert(key, handle);
    }

    /// Drop the timer for `key` without firing.
    pub fn cancel(&mut self, key: &K) {
        if let Some(handle) = self.pending.remove(key) {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }

    /// Timers not yet fired.
    pub fn pending(&self) -> usize {
        self.pending.values().filter(|h| !h.is_finished()).count()
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for handle in self.pending.values() {
            handle.abort();
        }
    }
}
