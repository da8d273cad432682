use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use stockroom_inventory::{
    Inventory, PRODUCT_SKU_FORMAT, ProductSku, Quantity, STOCK_LEVEL_NONNEGATIVE,
};

use super::{InventoryStore, InventoryTx, StoreError};

/// Where an injected failure fires.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    Query,
    Commit,
    Rollback,
}

#[derive(Debug, Default)]
struct Shared {
    rows: Mutex<HashMap<ProductSku, i64>>,
    faults: Mutex<HashSet<FaultPoint>>,
}

impl Shared {
    fn check_fault(&self, point: FaultPoint) -> Result<(), StoreError> {
        let faults = self
            .faults
            .lock()
            .map_err(|_| StoreError::Fault("lock poisoned".to_string()))?;
        if faults.contains(&point) {
            return Err(StoreError::Fault(format!("injected {point:?} failure")));
        }
        Ok(())
    }
}

/// In-memory inventory table.
///
/// Intended for tests/dev. Emulates the two check constraints of the real
/// table and the INTEGER range of `stock_level`. Writes are staged per
/// transaction and applied at commit; the last commit wins.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    shared: Arc<Shared>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed stock level, bypassing any transaction.
    pub fn stock_level(&self, sku: &ProductSku) -> Option<i64> {
        self.shared.rows.lock().ok()?.get(sku).copied()
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.shared.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Arm a failure; it keeps firing until cleared.
    pub fn fail_at(&self, point: FaultPoint) {
        if let Ok(mut faults) = self.shared.faults.lock() {
            faults.insert(point);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.shared.faults.lock() {
            faults.clear();
        }
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    type Tx = InMemoryInventoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        self.shared.check_fault(FaultPoint::Begin)?;
        Ok(InMemoryInventoryTx {
            shared: Arc::clone(&self.shared),
            staged: HashMap::new(),
        })
    }
}

/// Staged writes over the committed rows.
#[derive(Debug)]
pub struct InMemoryInventoryTx {
    shared: Arc<Shared>,
    staged: HashMap<ProductSku, i64>,
}

impl InMemoryInventoryTx {
    fn current(&self, sku: &ProductSku) -> Result<Option<i64>, StoreError> {
        if let Some(level) = self.staged.get(sku) {
            return Ok(Some(*level));
        }
        let rows = self
            .shared
            .rows
            .lock()
            .map_err(|_| StoreError::Fault("lock poisoned".to_string()))?;
        Ok(rows.get(sku).copied())
    }
}

fn check_violation(constraint: &str) -> StoreError {
    StoreError::check_violation(
        constraint,
        format!("new row for relation \"inventory\" violates check constraint \"{constraint}\""),
    )
}

fn out_of_range() -> StoreError {
    StoreError::Rejected {
        code: Some("22003".to_string()),
        constraint: None,
        message: "integer out of range".to_string(),
    }
}

#[async_trait]
impl InventoryTx for InMemoryInventoryTx {
    async fn add(&mut self, sku: &ProductSku, quantity: Quantity) -> Result<Inventory, StoreError> {
        self.shared.check_fault(FaultPoint::Query)?;
        if !sku.is_well_formed() {
            return Err(check_violation(PRODUCT_SKU_FORMAT));
        }

        let level = self.current(sku)?.unwrap_or(0) + i64::from(quantity);
        if level > i64::from(i32::MAX) {
            return Err(out_of_range());
        }

        self.staged.insert(sku.clone(), level);
        Ok(Inventory::new(sku.clone(), level))
    }

    async fn remove(
        &mut self,
        sku: &ProductSku,
        quantity: Quantity,
    ) -> Result<Option<Inventory>, StoreError> {
        self.shared.check_fault(FaultPoint::Query)?;
        let Some(current) = self.current(sku)? else {
            return Ok(None);
        };

        let level = current - i64::from(quantity);
        if level < 0 {
            return Err(check_violation(STOCK_LEVEL_NONNEGATIVE));
        }

        self.staged.insert(sku.clone(), level);
        Ok(Some(Inventory::new(sku.clone(), level)))
    }

    async fn get(&mut self, sku: &ProductSku) -> Result<Option<Inventory>, StoreError> {
        self.shared.check_fault(FaultPoint::Query)?;
        Ok(self
            .current(sku)?
            .map(|level| Inventory::new(sku.clone(), level)))
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.shared.check_fault(FaultPoint::Commit)?;
        let mut rows = self
            .shared
            .rows
            .lock()
            .map_err(|_| StoreError::Fault("lock poisoned".to_string()))?;
        rows.extend(self.staged);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.shared.check_fault(FaultPoint::Rollback)
    }
}
