//! Typed publish/subscribe channels.
//!
//! Delivery is in publish order per bus. Separate buses give no ordering
//! guarantee relative to each other.

use crossbeam_channel::{Receiver, Sender};

/// A fan-out event channel.
///
/// Subscribers whose receiver has been dropped are pruned on the next
/// publish.
pub struct EventBus<T> {
    subscribers: Vec<Sender<T>>,
}

impl<T: Clone> EventBus<T> {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Subscribe with a fresh unbounded receiver.
    pub fn subscribe(&mut self) -> Receiver<T> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Subscribe an existing sender, e.g. to fan several buses into one
    /// receiver.
    pub fn subscribe_with(&mut self, tx: Sender<T>) {
        self.subscribers.push(tx);
    }

    /// Deliver `event` to every live subscriber.
    pub fn publish(&mut self, event: T) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
