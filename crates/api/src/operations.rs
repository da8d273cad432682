//! Inventory operations run inside a request scope.
//!
//! Store rejections are translated by constraint identity, never by message
//! text. Add treats any rejection as the caller's problem; Remove only the
//! check violations; Get none. A remove that matches no record is a store
//! failure like any other.

use tracing::Instrument;

use stockroom_core::ServiceError;
use stockroom_infra::store::{InventoryTx, StoreError};
use stockroom_inventory::{AddRequest, GetRequest, Inventory, InventoryConstraint, ProductSku, RemoveRequest};

use crate::scope::{RequestScope, Stage, cancellable};

fn database_fault(err: &StoreError) -> ServiceError {
    ServiceError::system(format!("database error: {err}"))
}

fn constraint_message(sku: &ProductSku, err: &StoreError) -> String {
    InventoryConstraint::from_identity(err.constraint()).caller_message(sku, &err.to_string())
}

fn add_failure(sku: &ProductSku, err: StoreError) -> ServiceError {
    match err {
        StoreError::Fault(_) => database_fault(&err),
        rejected if rejected.is_check_violation() => ServiceError::caller(constraint_message(sku, &rejected)),
        rejected => ServiceError::caller(rejected.to_string()),
    }
}

/// What the store reports when an UPDATE ... RETURNING matches no row.
const NO_ROWS: &str = "no rows in result set";

fn remove_failure(sku: &ProductSku, err: StoreError) -> ServiceError {
    if err.is_check_violation() {
        ServiceError::caller(constraint_message(sku, &err))
    } else {
        database_fault(&err)
    }
}

/// Increment the SKU's stock, creating the record on first add.
pub async fn add_stock<T: InventoryTx>(scope: &mut RequestScope<T>, request: &AddRequest) -> Stage<Inventory> {
    let stage = scope.stage("add stock");
    let (tx, cancel) = scope.transaction(&stage)?;

    let result = cancellable(cancel, tx.add(&request.sku, request.quantity))
        .instrument(stage.clone())
        .await;

    match result {
        Ok(Ok(inventory)) => Ok(inventory),
        Ok(Err(err)) => Err(scope.add_error(&stage, add_failure(&request.sku, err))),
        Err(cancelled) => Err(scope.add_error(&stage, cancelled)),
    }
}

/// Decrement the SKU's stock; the store's nonnegative check rejects over-removal.
///
/// A SKU with no record has nothing to decrement and fails as a database error.
pub async fn remove_stock<T: InventoryTx>(
    scope: &mut RequestScope<T>,
    request: &RemoveRequest,
) -> Stage<Inventory> {
    let stage = scope.stage("remove stock");
    let (tx, cancel) = scope.transaction(&stage)?;

    let result = cancellable(cancel, tx.remove(&request.sku, request.quantity))
        .instrument(stage.clone())
        .await;

    match result {
        Ok(Ok(Some(inventory))) => Ok(inventory),
        Ok(Ok(None)) => Err(scope.add_system_error(&stage, format!("database error: {NO_ROWS}"))),
        Ok(Err(err)) => Err(scope.add_error(&stage, remove_failure(&request.sku, err))),
        Err(cancelled) => Err(scope.add_error(&stage, cancelled)),
    }
}

/// Read the SKU's stock; no record means zero.
pub async fn get_stock<T: InventoryTx>(scope: &mut RequestScope<T>, request: &GetRequest) -> Stage<Inventory> {
    let stage = scope.stage("get stock");
    let (tx, cancel) = scope.transaction(&stage)?;

    let result = cancellable(cancel, tx.get(&request.sku))
        .instrument(stage.clone())
        .await;

    match result {
        Ok(Ok(found)) => Ok(found.unwrap_or_else(|| Inventory::empty(request.sku.clone()))),
        Ok(Err(err)) => Err(scope.add_error(&stage, database_fault(&err))),
        Err(cancelled) => Err(scope.add_error(&stage, cancelled)),
    }
}
