//! In-memory event bus for tests/dev.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, mpsc};

use async_trait::async_trait;
use thiserror::Error;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    #[error("event bus lock poisoned")]
    Poisoned,
    /// Publishing was switched off with [`InMemoryEventBus::set_unavailable`].
    #[error("event bus unavailable")]
    Unavailable,
}

/// In-memory pub/sub bus.
///
/// - No IO
/// - Best-effort fan-out
/// - Can be switched into a failing mode to exercise publish errors
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
    unavailable: AtomicBool,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every `publish` fails with [`InMemoryBusError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    async fn publish(&self, message: M) -> Result<(), Self::Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(InMemoryBusError::Unavailable);
        }

        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_gets_a_copy() {
        let bus = InMemoryEventBus::<u32>::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(7).await.unwrap();

        assert_eq!(a.try_recv().unwrap(), 7);
        assert_eq!(b.try_recv().unwrap(), 7);
    }

    #[tokio::test]
    async fn late_subscribers_miss_earlier_messages() {
        let bus = InMemoryEventBus::<u32>::new();
        bus.publish(1).await.unwrap();

        let sub = bus.subscribe();
        bus.publish(2).await.unwrap();

        assert_eq!(sub.drain(), vec![2]);
    }

    #[tokio::test]
    async fn dropped_subscribers_do_not_break_publish() {
        let bus = InMemoryEventBus::<u32>::new();
        drop(bus.subscribe());

        assert!(bus.publish(3).await.is_ok());
    }

    #[tokio::test]
    async fn unavailable_bus_rejects_publish() {
        let bus = InMemoryEventBus::<u32>::new();
        let sub = bus.subscribe();
        bus.set_unavailable(true);

        let err = bus.publish(4).await.unwrap_err();
        assert!(matches!(err, InMemoryBusError::Unavailable));
        assert!(sub.drain().is_empty());

        bus.set_unavailable(false);
        bus.publish(5).await.unwrap();
        assert_eq!(sub.drain(), vec![5]);
    }
}
