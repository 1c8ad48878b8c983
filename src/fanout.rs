//! Concurrent-safe websocket subscriber set with broadcast.
//!
//! Subscribers register an outbound frame channel keyed by connection id.
//! Add/remove mutate under the write lock; broadcast snapshots the sender
//! list under the read lock and emits outside it, so a slow subscriber never
//! blocks writers.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

#[derive(Default)]
pub struct Fanout {
    subscribers: RwLock<HashMap<u64, UnboundedSender<String>>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Returns true when it is the first one (the
    /// caller starts the snapshot ticker on that edge).
    pub fn add(&self, id: u64, sender: UnboundedSender<String>) -> bool {
        let mut subscribers = self.subscribers.write().expect("fanout lock poisoned");
        let was_empty = subscribers.is_empty();
        debug!("Add subscriber {} to fan-out", id);
        subscribers.insert(id, sender);
        was_empty
    }

    /// Deregister a subscriber. Returns true when it was the last one (the
    /// caller stops the snapshot ticker on that edge).
    pub fn remove(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.write().expect("fanout lock poisoned");
        subscribers.remove(&id);
        subscribers.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers
            .read()
            .expect("fanout lock poisoned")
            .is_empty()
    }

    /// Send a frame to every subscriber. Disconnected receivers are skipped;
    /// their entries are cleaned up by the socket task's remove.
    pub fn broadcast(&self, frame: &str) {
        let senders: Vec<UnboundedSender<String>> = {
            let subscribers = self.subscribers.read().expect("fanout lock poisoned");
            subscribers.values().cloned().collect()
        };

        for sender in senders {
            let _ = sender.send(frame.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn add_and_remove_report_the_edges() {
        let fanout = Fanout::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        assert!(fanout.add(1, tx1));
        assert!(!fanout.add(2, tx2));
        assert!(!fanout.remove(1));
        assert!(fanout.remove(2));
        assert!(fanout.is_empty());
    }

    #[test]
    fn broadcast_reaches_every_live_subscriber() {
        let fanout = Fanout::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        fanout.add(1, tx1);
        fanout.add(2, tx2);

        fanout.broadcast("hello");

        assert_eq!(rx1.try_recv().unwrap(), "hello");
        assert_eq!(rx2.try_recv().unwrap(), "hello");
    }

    #[test]
    fn broadcast_survives_a_dropped_receiver() {
        let fanout = Fanout::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        fanout.add(1, tx1);
        fanout.add(2, tx2);
        drop(rx1);

        fanout.broadcast("still here");
        assert_eq!(rx2.try_recv().unwrap(), "still here");
    }
}
