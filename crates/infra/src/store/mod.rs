//! Inventory store boundary.
//!
//! The request pipeline talks to the store through two traits:
//! - [`InventoryStore`] hands out one transaction per request
//! - [`InventoryTx`] runs the three inventory statements inside it
//!
//! A transaction that is dropped without `commit`/`rollback` is rolled back by
//! the implementation (sqlx semantics for Postgres; staged writes discarded
//! in memory).

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use stockroom_inventory::{CHECK_VIOLATION, Inventory, ProductSku, Quantity};

pub use in_memory::{FaultPoint, InMemoryInventoryStore, InMemoryInventoryTx};
pub use postgres::{PoolConfig, PostgresInventoryStore, PostgresInventoryTx};

/// Store-level failure.
///
/// `Rejected` means the store refused the statement for a data reason
/// (constraint, range). `Fault` is everything else: connectivity, pool,
/// protocol, decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{message}")]
    Rejected {
        /// SQLSTATE, when the store reported one.
        code: Option<String>,
        /// Stable identity of the violated constraint.
        constraint: Option<String>,
        message: String,
    },

    #[error("{0}")]
    Fault(String),
}

impl StoreError {
    pub fn check_violation(constraint: &str, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: Some(CHECK_VIOLATION.to_string()),
            constraint: Some(constraint.to_string()),
            message: message.into(),
        }
    }

    pub fn is_check_violation(&self) -> bool {
        matches!(self, Self::Rejected { code: Some(code), .. } if code == CHECK_VIOLATION)
    }

    pub fn constraint(&self) -> Option<&str> {
        match self {
            Self::Rejected { constraint, .. } => constraint.as_deref(),
            Self::Fault(_) => None,
        }
    }
}

/// Source of per-request transactions.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    type Tx: InventoryTx;

    /// Acquire a connection and open a transaction on it.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// One open transaction holding one connection.
#[async_trait]
pub trait InventoryTx: Send + 'static {
    /// Add `quantity` to the SKU's stock, creating the record if absent.
    async fn add(&mut self, sku: &ProductSku, quantity: Quantity) -> Result<Inventory, StoreError>;

    /// Subtract `quantity` from the SKU's stock.
    ///
    /// `Ok(None)` when the SKU has no record. Going below zero is rejected by
    /// the store's nonnegative check.
    async fn remove(
        &mut self,
        sku: &ProductSku,
        quantity: Quantity,
    ) -> Result<Option<Inventory>, StoreError>;

    async fn get(&mut self, sku: &ProductSku) -> Result<Option<Inventory>, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> InventoryStore for std::sync::Arc<S>
where
    S: InventoryStore + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_inventory::STOCK_LEVEL_NONNEGATIVE;

    #[test]
    fn check_violations_carry_their_constraint() {
        let err = StoreError::check_violation(STOCK_LEVEL_NONNEGATIVE, "violates check");
        assert!(err.is_check_violation());
        assert_eq!(err.constraint(), Some(STOCK_LEVEL_NONNEGATIVE));
        assert_eq!(err.to_string(), "violates check");
    }

    #[test]
    fn faults_are_not_check_violations() {
        let err = StoreError::Fault("connection reset".into());
        assert!(!err.is_check_violation());
        assert_eq!(err.constraint(), None);
    }

    #[test]
    fn other_rejections_are_not_check_violations() {
        let err = StoreError::Rejected {
            code: Some("22003".into()),
            constraint: None,
            message: "integer out of range".into(),
        };
        assert!(!err.is_check_violation());
    }
}
