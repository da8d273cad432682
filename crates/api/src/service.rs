//! The stock service: one pipeline per inbound message.
//!
//! ```text
//! message → scope(begin) → validate → decode → operation → [low-stock event] → settle → respond
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use stockroom_events::{EventBus, LowStockEvent};
use stockroom_infra::schema::SchemaRegistry;
use stockroom_infra::store::InventoryStore;
use stockroom_inventory::{AddRequest, GetRequest, Inventory, RemoveRequest};
use stockroom_observability::Telemetry;

use crate::emitter::emit_low_stock_event;
use crate::operations::{add_stock, get_stock, remove_stock};
use crate::response::StockResponse;
use crate::scope::{RequestScope, Stage};

pub const SERVICE_NAME: &str = "StockService";
pub const SERVICE_VERSION: &str = "0.1.0";
/// Every operation subject lives under `stock.`.
pub const SUBJECT_GROUP: &str = "stock";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Remove,
    Get,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Add, Operation::Remove, Operation::Get];

    pub fn subject(self) -> &'static str {
        match self {
            Self::Add => "stock.add",
            Self::Remove => "stock.remove",
            Self::Get => "stock.get",
        }
    }

    /// Logical name of the request schema.
    pub fn schema(self) -> &'static str {
        match self {
            Self::Add => "stock-add.request.json",
            Self::Remove => "stock-remove.request.json",
            Self::Get => "stock-get.request.json",
        }
    }

    pub fn from_subject(subject: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.subject() == subject)
    }
}

/// Per-message identity and cancellation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            cancel,
        }
    }

    /// A context nothing else can cancel.
    pub fn detached() -> Self {
        Self::new(CancellationToken::new())
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode response: {0}")]
    Encode(String),
    #[error("failed to publish response: {0}")]
    Publish(String),
}

/// Where a message's single response goes.
///
/// `respond` takes `self`, so a reply handle answers at most once.
#[async_trait]
pub trait Reply: Send {
    async fn respond(self, body: Bytes) -> Result<(), TransportError>;
}

pub struct StockService<S, B> {
    store: S,
    bus: B,
    schemas: Arc<SchemaRegistry>,
    telemetry: Telemetry,
}

impl<S, B> StockService<S, B>
where
    S: InventoryStore,
    B: EventBus<LowStockEvent>,
{
    pub fn new(store: S, bus: B, schemas: Arc<SchemaRegistry>, telemetry: Telemetry) -> Self {
        Self {
            store,
            bus,
            schemas,
            telemetry,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Run one message through the pipeline and answer it exactly once.
    pub async fn dispatch<R: Reply>(
        &self,
        subject: &str,
        payload: &[u8],
        reply: R,
        ctx: RequestContext,
    ) -> Result<StockResponse, TransportError> {
        let response = self.handle(subject, payload, ctx).await;
        let body = serde_json::to_vec(&response).map_err(|e| TransportError::Encode(e.to_string()))?;
        reply.respond(Bytes::from(body)).await?;
        Ok(response)
    }

    /// Run one message through the pipeline and return its response.
    pub async fn handle(&self, subject: &str, payload: &[u8], ctx: RequestContext) -> StockResponse {
        let span = self.telemetry.request_span(subject, &ctx.request_id);
        self.telemetry.api_request(&span, subject, payload.len());

        let Some(operation) = Operation::from_subject(subject) else {
            let stage = self.telemetry.stage_span(&span, "respond JSON");
            let message = format!("unknown operation: {subject}");
            self.telemetry.caller_error(&stage, &message);
            return StockResponse::failure(message);
        };

        let pipeline = async {
            let mut scope =
                RequestScope::begin(&self.store, self.telemetry.clone(), span.clone(), ctx.cancel).await;
            let outcome = match operation {
                Operation::Add => self.add(&mut scope, payload).await,
                Operation::Remove => self.remove(&mut scope, payload).await,
                Operation::Get => self.get(&mut scope, payload).await,
            };
            scope.finish(outcome).await
        };

        pipeline.instrument(span.clone()).await
    }

    async fn add(&self, scope: &mut RequestScope<S::Tx>, payload: &[u8]) -> Stage<Inventory> {
        scope.validate_json(&self.schemas, payload, Operation::Add.schema())?;
        let request: AddRequest = scope.decode(payload)?;
        add_stock(scope, &request).await
    }

    async fn remove(&self, scope: &mut RequestScope<S::Tx>, payload: &[u8]) -> Stage<Inventory> {
        scope.validate_json(&self.schemas, payload, Operation::Remove.schema())?;
        let request: RemoveRequest = scope.decode(payload)?;
        let inventory = remove_stock(scope, &request).await?;
        emit_low_stock_event(scope, &self.bus, &inventory).await?;
        Ok(inventory)
    }

    async fn get(&self, scope: &mut RequestScope<S::Tx>, payload: &[u8]) -> Stage<Inventory> {
        scope.validate_json(&self.schemas, payload, Operation::Get.schema())?;
        let request: GetRequest = scope.decode(payload)?;
        get_stock(scope, &request).await
    }
}
