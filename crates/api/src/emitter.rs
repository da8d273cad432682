//! Low-stock notifications.

use tracing::Instrument;

use stockroom_core::ServiceError;
use stockroom_events::{Event, EventBus, LowStockEvent};
use stockroom_infra::store::InventoryTx;
use stockroom_inventory::Inventory;

use crate::scope::{RequestScope, Stage, cancellable};

/// Publish a [`LowStockEvent`] when `inventory` sits under the threshold.
///
/// Runs before the transaction settles: a later commit failure leaves the
/// notification out in the world for a change the store never kept.
pub async fn emit_low_stock_event<T, B>(
    scope: &mut RequestScope<T>,
    bus: &B,
    inventory: &Inventory,
) -> Stage<()>
where
    T: InventoryTx,
    B: EventBus<LowStockEvent> + ?Sized,
{
    scope.proceed()?;
    if !inventory.is_low_stock() {
        return Ok(());
    }

    let stage = scope.stage("emit low stock event");
    let event = LowStockEvent::from(inventory);
    let result = cancellable(scope.cancellation(), bus.publish(event))
        .instrument(stage.clone())
        .await;

    match result {
        Ok(Ok(())) => {
            tracing::info!(
                parent: &stage,
                subject = LowStockEvent::SUBJECT,
                sku = %inventory.product_sku,
                stock_level = inventory.stock_level,
                "low stock event published"
            );
            Ok(())
        }
        Ok(Err(err)) => Err(scope.add_error(
            &stage,
            ServiceError::system(format!("failed to publish low stock event: {err}")),
        )),
        Err(cancelled) => Err(scope.add_error(&stage, cancelled)),
    }
}
