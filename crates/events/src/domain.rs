//! Domain events emitted from business operations.

use serde::{Deserialize, Serialize};

use stockroom_inventory::{Inventory, ProductSku};

use crate::event::Event;

/// A removal left `product_sku` below the low-stock threshold.
///
/// Published once per qualifying removal; never persisted or retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockEvent {
    #[serde(rename = "product-sku")]
    pub product_sku: ProductSku,
    #[serde(rename = "stock-level")]
    pub stock_level: i64,
}

impl Event for LowStockEvent {
    const SUBJECT: &'static str = "events.low_stock";
}

impl From<&Inventory> for LowStockEvent {
    fn from(inventory: &Inventory) -> Self {
        Self {
            product_sku: inventory.product_sku.clone(),
            stock_level: inventory.stock_level,
        }
    }
}
