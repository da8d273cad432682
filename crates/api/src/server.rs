//! NATS request loop.
//!
//! One queue subscription covers every subject under `stock.`; instances that
//! share a queue group split the traffic. Each message runs on its own task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use stockroom_events::{EventBus, LowStockEvent};
use stockroom_infra::store::InventoryStore;

use crate::service::{Reply, RequestContext, SUBJECT_GROUP, StockService, TransportError};

/// How long shutdown waits for a message the client has already buffered.
const DRAIN_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to subscribe to {subject}: {message}")]
    Subscribe { subject: String, message: String },
}

/// Reply handle for one NATS message.
pub struct NatsReply {
    client: async_nats::Client,
    reply_to: Option<async_nats::Subject>,
}

impl NatsReply {
    pub fn new(client: async_nats::Client, reply_to: Option<async_nats::Subject>) -> Self {
        Self { client, reply_to }
    }
}

#[async_trait]
impl Reply for NatsReply {
    async fn respond(self, body: Bytes) -> Result<(), TransportError> {
        let Some(reply_to) = self.reply_to else {
            tracing::info!(
                response = %String::from_utf8_lossy(&body),
                "message had no reply subject; response not sent"
            );
            return Ok(());
        };

        self.client
            .publish(reply_to, body)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }
}

fn spawn_request<S, B>(
    in_flight: &mut JoinSet<()>,
    client: &async_nats::Client,
    service: &Arc<StockService<S, B>>,
    message: async_nats::Message,
    cancel: CancellationToken,
) where
    S: InventoryStore + 'static,
    B: EventBus<LowStockEvent> + 'static,
{
    let service = Arc::clone(service);
    let reply = NatsReply::new(client.clone(), message.reply.clone());
    let ctx = RequestContext::new(cancel);

    in_flight.spawn(async move {
        let subject = message.subject.as_str();
        if let Err(err) = service.dispatch(subject, &message.payload, reply, ctx).await {
            tracing::error!(subject, error = %err, "failed to send response");
        }
    });
}

/// Serve until `shutdown` fires, then wait for in-flight requests.
///
/// In-flight requests share `shutdown` as their parent signal, so they abort
/// their current stage and roll back rather than run to completion. Messages
/// still buffered in the subscription at shutdown are answered with the
/// cancellation failure.
pub async fn serve<S, B>(
    client: async_nats::Client,
    service: Arc<StockService<S, B>>,
    queue_group: &str,
    shutdown: CancellationToken,
) -> Result<(), ServerError>
where
    S: InventoryStore + 'static,
    B: EventBus<LowStockEvent> + 'static,
{
    let subject = format!("{SUBJECT_GROUP}.>");
    let mut subscriber = client
        .queue_subscribe(subject.clone(), queue_group.to_string())
        .await
        .map_err(|e| ServerError::Subscribe {
            subject: subject.clone(),
            message: e.to_string(),
        })?;

    tracing::info!(
        service = service.telemetry().service(),
        version = service.telemetry().version(),
        subject = %subject,
        queue_group,
        "stock service listening"
    );

    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = subscriber.next() => {
                let Some(message) = next else {
                    tracing::warn!("subscription closed by the server");
                    break;
                };

                spawn_request(&mut in_flight, &client, &service, message, shutdown.child_token());
            }
        }

        while let Some(joined) = in_flight.try_join_next() {
            if let Err(err) = joined {
                tracing::error!(error = %err, "request task failed");
            }
        }
    }

    if let Err(err) = subscriber.unsubscribe().await {
        tracing::warn!(error = %err, "failed to unsubscribe");
    }

    let mut drained = 0usize;
    while let Ok(Some(message)) = tokio::time::timeout(DRAIN_POLL, subscriber.next()).await {
        drained += 1;
        spawn_request(&mut in_flight, &client, &service, message, shutdown.child_token());
    }
    if drained > 0 {
        tracing::info!(drained, "answered buffered messages after shutdown");
    }

    tracing::info!(in_flight = in_flight.len(), "draining in-flight requests");
    while let Some(joined) = in_flight.join_next().await {
        if let Err(err) = joined {
            tracing::error!(error = %err, "request task failed");
        }
    }

    Ok(())
}
