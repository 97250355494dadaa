//! Non-blocking fan-out of raw key events to independent observers
//!
//! Every subscriber owns a bounded queue. A subscriber whose queue is full
//! when an event arrives is considered unresponsive: its queue is closed
//! and it is dropped, so one slow observer never holds up the producer or
//! the other observers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Default per-subscriber queue depth
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;

/// Identifies one subscription for `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Receiving end handed out by `Broadcaster::subscribe`
#[derive(Debug)]
pub struct Subscription<T> {
    id: SubscriberId,
    rx: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or `None` once the queue is closed and drained
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub fn try_recv(&mut self) -> Result<T, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

/// Fan-out hub owned by the shortcut service
#[derive(Debug)]
pub struct Broadcaster<T> {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<T>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl<T: Clone> Broadcaster<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().insert(id, tx);
        debug!(subscriber = id.0, "subscriber added");
        Subscription { id, rx }
    }

    /// Remove a subscriber and close its queue. Returns false if it was
    /// already gone (dropped for being slow, or unsubscribed twice).
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().remove(&id).is_some()
    }

    /// Offer `msg` to every subscriber without ever waiting
    pub fn broadcast(&self, msg: T) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|id, tx| match tx.try_send(msg.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = id.0, "subscriber queue full, dropping subscriber");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = id.0, "subscriber went away");
                false
            }
        });
    }

    /// Close every queue (session teardown)
    pub fn close_all(&self) {
        let mut subscribers = self.subscribers.lock();
        if !subscribers.is_empty() {
            debug!(count = subscribers.len(), "closing all subscribers");
        }
        subscribers.clear();
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<T: Clone> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    #[test]
    fn test_every_subscriber_gets_every_event() {
        let hub = Broadcaster::new(4);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.broadcast(1u32);
        hub.broadcast(2u32);

        assert_eq!(a.try_recv().unwrap(), 1);
        assert_eq!(a.try_recv().unwrap(), 2);
        assert_eq!(b.try_recv().unwrap(), 1);
        assert_eq!(b.try_recv().unwrap(), 2);
    }

    #[test]
    fn test_full_subscriber_is_dropped_without_affecting_others() {
        let hub = Broadcaster::new(2);
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        for n in 0..3u32 {
            hub.broadcast(n);
            assert_eq!(fast.try_recv().unwrap(), n);
        }

        assert_eq!(hub.subscriber_count(), 1);
        // What was queued before the overflow is still readable, then the
        // stream ends.
        assert_eq!(slow.try_recv().unwrap(), 0);
        assert_eq!(slow.try_recv().unwrap(), 1);
        assert_eq!(slow.try_recv(), Err(TryRecvError::Disconnected));

        hub.broadcast(3);
        assert_eq!(fast.try_recv().unwrap(), 3);
    }

    #[test]
    fn test_unsubscribe_closes_queue() {
        let hub = Broadcaster::<u32>::new(4);
        let mut sub = hub.subscribe();

        assert!(hub.unsubscribe(sub.id()));
        assert!(!hub.unsubscribe(sub.id()));
        assert_eq!(sub.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let hub = Broadcaster::new(4);
        let sub = hub.subscribe();
        drop(sub);

        hub.broadcast(7u32);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_all_ends_streams() {
        let hub = Broadcaster::new(4);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        hub.broadcast(5u32);

        hub.close_all();

        assert_eq!(a.recv().await, Some(5));
        assert_eq!(a.recv().await, None);
        assert_eq!(b.recv().await, Some(5));
        assert_eq!(b.recv().await, None);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
