//! NATS core pub/sub event bus.
//!
//! Core NATS is not durable: a notification published while nobody listens is
//! dropped. That matches what the stock service promises for low-stock events.

use std::sync::mpsc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use thiserror::Error;

use stockroom_events::{Event, EventBus, Subscription};

#[derive(Debug, Error)]
pub enum NatsBusError {
    #[error("failed to encode event: {0}")]
    Encode(String),
    #[error("failed to publish event: {0}")]
    Publish(String),
}

/// Publishes each event as JSON on its own subject.
#[derive(Debug, Clone)]
pub struct NatsEventBus {
    client: async_nats::Client,
}

impl NatsEventBus {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<E> EventBus<E> for NatsEventBus
where
    E: Event,
{
    type Error = NatsBusError;

    async fn publish(&self, message: E) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&message).map_err(|e| NatsBusError::Encode(e.to_string()))?;

        self.client
            .publish(E::SUBJECT, Bytes::from(payload))
            .await
            .map_err(|e| NatsBusError::Publish(e.to_string()))
    }

    /// Must be called from within a tokio runtime; outside one the returned
    /// subscription is already disconnected.
    fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::channel();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Subscription::new(rx);
        };

        let client = self.client.clone();

        // Background task that receives messages and forwards decoded events.
        runtime.spawn(async move {
            let mut subscriber = match client.subscribe(E::SUBJECT).await {
                Ok(s) => s,
                Err(err) => {
                    tracing::warn!(subject = E::SUBJECT, error = %err, "event subscription failed");
                    return;
                }
            };

            while let Some(msg) = subscriber.next().await {
                let event: E = match serde_json::from_slice(&msg.payload) {
                    Ok(e) => e,
                    Err(_) => continue,
                };

                if tx.send(event).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}
