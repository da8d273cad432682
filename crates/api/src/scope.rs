//! Per-request transactional scope.
//!
//! A [`RequestScope`] owns one transaction (and with it one pooled connection)
//! plus at most one recorded error. Every stage returns a [`Stage`]; once an
//! error is recorded, later stages short-circuit through `?` without touching
//! the store or the bus again.
//!
//! Teardown happens exactly once:
//! - [`RequestScope::finish`] / [`RequestScope::close`] on the normal path
//! - `Drop` otherwise (the dropped transaction rolls back and frees its connection)

use std::future::Future;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use stockroom_core::{ErrorClass, ServiceError, ServiceResult};
use stockroom_infra::schema::SchemaRegistry;
use stockroom_infra::store::{InventoryStore, InventoryTx, StoreError};
use stockroom_inventory::Inventory;
use stockroom_observability::Telemetry;

use crate::response::StockResponse;

/// The scope already holds an error; the stage did nothing.
///
/// Only a [`RequestScope`] can produce one, so a halted pipeline always has
/// its error recorded on the scope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Halted(());

/// Outcome of one pipeline stage.
pub type Stage<T> = Result<T, Halted>;

/// Race `fut` against the request's cancellation signal.
pub async fn cancellable<F>(cancel: &CancellationToken, fut: F) -> ServiceResult<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ServiceError::cancelled()),
        out = fut => Ok(out),
    }
}

fn store_outcome<R>(
    result: ServiceResult<Result<R, StoreError>>,
    context: &str,
) -> ServiceResult<R> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ServiceError::system(format!("{context}: {err}"))),
        Err(cancelled) => Err(cancelled),
    }
}

pub struct RequestScope<T: InventoryTx> {
    telemetry: Telemetry,
    span: Span,
    cancel: CancellationToken,
    tx: Option<T>,
    error: Option<ServiceError>,
    closed: bool,
}

impl<T: InventoryTx> RequestScope<T> {
    /// Acquire a connection and open a transaction.
    ///
    /// Never fails: if the store cannot hand out a transaction the scope is
    /// born holding a system error and every stage becomes a no-op.
    pub async fn begin<S>(store: &S, telemetry: Telemetry, span: Span, cancel: CancellationToken) -> Self
    where
        S: InventoryStore<Tx = T> + ?Sized,
    {
        let mut scope = Self {
            telemetry,
            span,
            cancel,
            tx: None,
            error: None,
            closed: false,
        };

        let stage = scope.stage("setup db conn");
        let result = cancellable(&scope.cancel, store.begin())
            .instrument(stage.clone())
            .await;
        match store_outcome(result, "failed to begin transaction") {
            Ok(tx) => scope.tx = Some(tx),
            Err(err) => {
                let _ = scope.add_error(&stage, err);
            }
        }
        scope
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Child span for one stage of this request.
    pub fn stage(&self, name: &'static str) -> Span {
        self.telemetry.stage_span(&self.span, name)
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&ServiceError> {
        self.error.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Log `err` for its class and keep it if it is the first one.
    pub fn add_error(&mut self, stage: &Span, err: ServiceError) -> Halted {
        match err.class() {
            ErrorClass::Caller => self.telemetry.caller_error(stage, &err),
            ErrorClass::System => self.telemetry.system_error(&self.span, stage, &err),
        }
        if self.error.is_none() {
            self.error = Some(err);
        }
        Halted(())
    }

    pub fn add_caller_error(&mut self, stage: &Span, message: impl Into<String>) -> Halted {
        self.add_error(stage, ServiceError::caller(message))
    }

    pub fn add_system_error(&mut self, stage: &Span, message: impl Into<String>) -> Halted {
        self.add_error(stage, ServiceError::system(message))
    }

    /// `Ok` while the scope holds no error and the request is not cancelled.
    pub fn proceed(&mut self) -> Stage<()> {
        if self.error.is_some() {
            return Err(Halted(()));
        }
        if self.cancel.is_cancelled() {
            let span = self.span.clone();
            return Err(self.add_error(&span, ServiceError::cancelled()));
        }
        Ok(())
    }

    /// The open transaction and the signal every store call must race.
    pub fn transaction(&mut self, stage: &Span) -> Stage<(&mut T, &CancellationToken)> {
        self.proceed()?;
        if self.tx.is_none() {
            return Err(self.add_system_error(stage, "transaction already closed"));
        }
        let tx = self.tx.as_mut().ok_or(Halted(()))?;
        Ok((tx, &self.cancel))
    }

    /// Check `payload` against the named schema.
    pub fn validate_json(&mut self, schemas: &SchemaRegistry, payload: &[u8], schema: &str) -> Stage<()> {
        self.proceed()?;
        let stage = self.stage("validate JSON");
        let _entered = stage.enter();

        if payload.is_empty() {
            return Err(self.add_caller_error(&stage, "JSON data is empty"));
        }

        let compiled = match schemas.compile(schema) {
            Ok(compiled) => compiled,
            Err(err) => return Err(self.add_system_error(&stage, err.to_string())),
        };

        let value: serde_json::Value = match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(err) => {
                return Err(self.add_caller_error(&stage, format!("failed to unmarshal JSON data: {err}")));
            }
        };

        compiled
            .validate(&value)
            .map_err(|violation| self.add_caller_error(&stage, violation.to_string()))
    }

    /// Parse a validated payload into a typed request.
    pub fn decode<R: DeserializeOwned>(&mut self, payload: &[u8]) -> Stage<R> {
        self.proceed()?;
        let stage = self.stage("decode request");
        let _entered = stage.enter();

        serde_json::from_slice(payload)
            .map_err(|err| self.add_caller_error(&stage, format!("failed to decode request: {err}")))
    }

    /// Roll back if an error is held, otherwise commit. No-op once the
    /// transaction is gone, so it is safe to call repeatedly.
    ///
    /// Cancellation is checked before a commit is issued, never raced against
    /// it: a COMMIT already sent may land even if its future is dropped.
    pub async fn commit_or_rollback(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };

        if self.error.is_none() && self.cancel.is_cancelled() {
            let stage = self.stage("tx commit");
            let _ = self.add_error(&stage, ServiceError::cancelled());
        }

        let (stage, result) = if self.error.is_some() {
            let stage = self.stage("tx rollback");
            let result = tx.rollback().instrument(stage.clone()).await;
            (stage, store_outcome(Ok(result), "failed to roll back transaction"))
        } else {
            let stage = self.stage("tx commit");
            let result = tx.commit().instrument(stage.clone()).await;
            (stage, store_outcome(Ok(result), "failed to commit transaction"))
        };

        if let Err(err) = result {
            let _ = self.add_error(&stage, err);
        }
    }

    /// Finish the transaction and release the connection. Idempotent.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.commit_or_rollback().await;
        tracing::debug!(parent: &self.span, failed = self.error.is_some(), "request scope closed");
    }

    /// Settle the transaction, render the one response and close the scope.
    ///
    /// The transaction is settled first so a failed commit is reported as a
    /// failure rather than a success the store never kept.
    pub async fn finish(mut self, outcome: Stage<Inventory>) -> StockResponse {
        self.commit_or_rollback().await;

        let response = {
            let stage = self.stage("respond JSON");
            let _entered = stage.enter();
            StockResponse::build(outcome, self.error.as_ref())
        };

        self.close().await;
        response
    }
}

impl<T: InventoryTx> Drop for RequestScope<T> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(
                parent: &self.span,
                "request scope dropped before close; transaction rolled back"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_infra::store::{FaultPoint, InMemoryInventoryStore, InMemoryInventoryTx};
    use stockroom_inventory::{AddRequest, ProductSku, Quantity};

    fn schemas() -> SchemaRegistry {
        SchemaRegistry::load_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/../../schemas")).unwrap()
    }

    fn telemetry() -> Telemetry {
        Telemetry::new("StockService", "0.1.0")
    }

    async fn open(store: &InMemoryInventoryStore) -> RequestScope<InMemoryInventoryTx> {
        let telemetry = telemetry();
        let span = telemetry.request_span("stock.add", &"test");
        RequestScope::begin(store, telemetry, span, CancellationToken::new()).await
    }

    async fn stage_add(scope: &mut RequestScope<InMemoryInventoryTx>, sku: &str, n: i64) {
        let stage = scope.stage("add stock");
        let (tx, _) = scope.transaction(&stage).unwrap();
        tx.add(&ProductSku::from(sku), Quantity::new(n).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn first_error_wins() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;
        let stage = scope.stage("test");

        let _ = scope.add_caller_error(&stage, "first");
        let _ = scope.add_system_error(&stage, "second");
        let _ = scope.add_caller_error(&stage, "third");

        assert_eq!(scope.error(), Some(&ServiceError::caller("first")));
        assert!(scope.proceed().is_err());
    }

    #[tokio::test]
    async fn failed_begin_leaves_the_scope_born_failed() {
        let store = InMemoryInventoryStore::new();
        store.fail_at(FaultPoint::Begin);

        let mut scope = open(&store).await;
        let err = scope.error().cloned().unwrap();
        assert!(err.is_system());
        assert!(err.message().starts_with("failed to begin transaction"), "{err}");

        let payload = br#"{"product-sku":"sku-1","quantity":1}"#;
        assert!(scope.validate_json(&schemas(), payload, "stock-add.request.json").is_err());
        assert!(scope.decode::<AddRequest>(payload).is_err());
        assert_eq!(scope.error(), Some(&err));
        scope.close().await;
    }

    #[tokio::test]
    async fn empty_payload_is_a_caller_error() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;

        assert!(scope.validate_json(&schemas(), b"", "stock-add.request.json").is_err());
        assert_eq!(scope.error(), Some(&ServiceError::caller("JSON data is empty")));
    }

    #[tokio::test]
    async fn unknown_schema_is_a_system_error() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;

        assert!(scope.validate_json(&schemas(), b"{}", "missing.json").is_err());
        assert_eq!(
            scope.error(),
            Some(&ServiceError::system("schema not found: missing.json"))
        );
    }

    #[tokio::test]
    async fn unparseable_payload_is_a_caller_error() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;

        assert!(scope.validate_json(&schemas(), b"{not json", "stock-add.request.json").is_err());
        let err = scope.error().unwrap();
        assert!(!err.is_system());
        assert!(err.message().starts_with("failed to unmarshal JSON data:"), "{err}");
    }

    #[tokio::test]
    async fn schema_mismatch_names_schema_and_field() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;

        let payload = br#"{"product-sku":"^%-2","quantity":1}"#;
        assert!(scope.validate_json(&schemas(), payload, "stock-add.request.json").is_err());
        let err = scope.error().unwrap();
        assert!(!err.is_system());
        assert!(
            err.message()
                .starts_with("JSON data does not conform to schema stock-add.request.json: '/product-sku'"),
            "{err}"
        );
    }

    #[tokio::test]
    async fn valid_payload_decodes() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;

        let payload = br#"{"product-sku":"sku-1","quantity":3}"#;
        scope.validate_json(&schemas(), payload, "stock-add.request.json").unwrap();
        let request: AddRequest = scope.decode(payload).unwrap();
        assert_eq!(request.quantity.get(), 3);
        assert!(!scope.has_error());
    }

    #[tokio::test]
    async fn commit_happens_once_and_close_is_idempotent() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;
        stage_add(&mut scope, "sku-1", 5).await;

        scope.commit_or_rollback().await;
        scope.commit_or_rollback().await;
        scope.close().await;
        scope.close().await;

        assert!(scope.is_closed());
        assert!(!scope.has_error());
        assert_eq!(store.stock_level(&ProductSku::from("sku-1")), Some(5));
    }

    #[tokio::test]
    async fn held_error_rolls_back() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;
        stage_add(&mut scope, "sku-1", 5).await;

        let stage = scope.stage("test");
        let _ = scope.add_caller_error(&stage, "nope");
        scope.close().await;

        assert_eq!(store.stock_level(&ProductSku::from("sku-1")), None);
    }

    #[tokio::test]
    async fn commit_failure_is_recorded_as_system_error() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;
        stage_add(&mut scope, "sku-1", 5).await;

        store.fail_at(FaultPoint::Commit);
        scope.close().await;

        let err = scope.error().unwrap();
        assert!(err.is_system());
        assert!(err.message().starts_with("failed to commit transaction"), "{err}");
    }

    #[tokio::test]
    async fn rollback_failure_does_not_replace_the_first_error() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;

        let stage = scope.stage("test");
        let _ = scope.add_caller_error(&stage, "bad input");
        store.fail_at(FaultPoint::Rollback);
        scope.close().await;

        assert_eq!(scope.error(), Some(&ServiceError::caller("bad input")));
    }

    #[tokio::test]
    async fn cancellation_surfaces_as_system_error_and_discards_writes() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;
        stage_add(&mut scope, "sku-1", 5).await;

        scope.cancellation().cancel();
        assert!(scope.proceed().is_err());
        scope.close().await;

        assert_eq!(scope.error(), Some(&ServiceError::cancelled()));
        assert_eq!(store.stock_level(&ProductSku::from("sku-1")), None);
    }

    #[tokio::test]
    async fn cancellation_before_settling_rolls_back_instead_of_committing() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;
        stage_add(&mut scope, "sku-1", 5).await;

        scope.cancellation().cancel();
        scope.commit_or_rollback().await;

        assert_eq!(scope.error(), Some(&ServiceError::cancelled()));
        assert_eq!(store.stock_level(&ProductSku::from("sku-1")), None);
    }

    #[tokio::test]
    async fn commit_runs_to_completion_once_started() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;
        stage_add(&mut scope, "sku-1", 5).await;

        scope.commit_or_rollback().await;
        scope.cancellation().cancel();
        scope.close().await;

        assert!(!scope.has_error());
        assert_eq!(store.stock_level(&ProductSku::from("sku-1")), Some(5));
    }

    #[tokio::test]
    async fn dropping_an_open_scope_discards_writes() {
        let store = InMemoryInventoryStore::new();
        let mut scope = open(&store).await;
        stage_add(&mut scope, "sku-1", 5).await;
        drop(scope);

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn cancellable_prefers_the_signal() {
        let token = CancellationToken::new();
        token.cancel();
        let out = cancellable(&token, async { 1 }).await;
        assert_eq!(out, Err(ServiceError::cancelled()));

        let live = CancellationToken::new();
        assert_eq!(cancellable(&live, async { 2 }).await, Ok(2));
    }
}
