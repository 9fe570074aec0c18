//! Subscriber Registry
//!
//! Explicit id → sender map behind every multicast stream. The number of
//! entries is the stream's reference count.

use std::collections::BTreeMap;
use tokio::sync::mpsc;

pub type SubscriberId = u64;

pub struct SubscriberRegistry<T> {
    next_id: SubscriberId,
    senders: BTreeMap<SubscriberId, mpsc::UnboundedSender<T>>,
}

impl<T: Clone> SubscriberRegistry<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            senders: BTreeMap::new(),
        }
    }

    /// Register a subscriber, queueing `initial` ahead of any broadcast
    pub fn insert(
        &mut self,
        initial: impl IntoIterator<Item = T>,
    ) -> (SubscriberId, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        for item in initial {
            let _ = tx.send(item);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.senders.insert(id, tx);
        (id, rx)
    }

    pub fn remove(&mut self, id: SubscriberId) -> bool {
        self.senders.remove(&id).is_some()
    }

    /// Deliver `item` to every subscriber in registration order
    pub fn broadcast(&mut self, item: &T) {
        self.senders.retain(|_, tx| tx.send(item.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Drop every sender, ending all subscriber streams
    pub fn clear(&mut self) {
        self.senders.clear();
    }
}

impl<T: Clone> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
