//! Inventory domain module.
//!
//! This crate contains the inventory vocabulary shared by the store adapters
//! and the request pipeline, implemented as plain data and deterministic
//! rules (no IO, no transport, no storage).

pub mod constraint;
pub mod record;
pub mod request;
pub mod sku;

pub use constraint::{CHECK_VIOLATION, InventoryConstraint, PRODUCT_SKU_FORMAT, STOCK_LEVEL_NONNEGATIVE};
pub use record::{Inventory, LOW_STOCK_THRESHOLD};
pub use request::{AddRequest, GetRequest, RemoveRequest};
pub use sku::{InvalidQuantity, ProductSku, Quantity, SKU_MAX_LEN};
