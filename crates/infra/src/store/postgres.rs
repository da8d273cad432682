//! Postgres-backed inventory store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (check violation) | `23514` | `Rejected` + constraint name | Over-removal, malformed SKU |
//! | Database (other integrity) | `23xxx` | `Rejected` | Should not occur for this table |
//! | Database (data exception) | `22xxx` | `Rejected` | e.g. `stock_level` overflows INTEGER |
//! | Database (other) | Any other | `Fault` | Serialization failure, admin shutdown, ... |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Fault` | Connectivity |
//!
//! The constraint identity comes from the server's error fields, never from
//! the message text.
//!
//! ## Thread Safety
//!
//! `PostgresInventoryStore` is `Send + Sync` and cheap to clone; every request
//! takes its own transaction from the shared pool.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use stockroom_inventory::{Inventory, ProductSku, Quantity};

use super::{InventoryStore, InventoryTx, StoreError};

/// Pool sizing applied by [`PostgresInventoryStore::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            max_lifetime: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the pool and verify the database answers.
    #[instrument(skip(url), fields(max_connections = config.max_connections), err)]
    pub async fn connect(url: &str, config: PoolConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(config.max_lifetime)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.ping().await?;
        Ok(store)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wait for checked-out connections to come back, then close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    type Tx = PostgresInventoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresInventoryTx { tx })
    }
}

/// One pooled connection with an open transaction.
///
/// Dropping it without `commit` rolls back and returns the connection.
#[derive(Debug)]
pub struct PostgresInventoryTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl InventoryTx for PostgresInventoryTx {
    #[instrument(
        skip(self),
        fields(sku = %sku, quantity = %quantity, stock_level = tracing::field::Empty),
        err
    )]
    async fn add(&mut self, sku: &ProductSku, quantity: Quantity) -> Result<Inventory, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO inventory (product_sku, stock_level)
            VALUES ($1, $2)
            ON CONFLICT (product_sku)
            DO UPDATE SET stock_level = inventory.stock_level + EXCLUDED.stock_level
            RETURNING product_sku, stock_level
            "#,
        )
        .bind(sku.as_str())
        .bind(quantity.get())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("add", e))?;

        let inventory = inventory_from_row(&row)?;
        Span::current().record("stock_level", inventory.stock_level);
        Ok(inventory)
    }

    #[instrument(skip(self), fields(sku = %sku, quantity = %quantity), err)]
    async fn remove(
        &mut self,
        sku: &ProductSku,
        quantity: Quantity,
    ) -> Result<Option<Inventory>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE inventory
            SET stock_level = stock_level - $2
            WHERE product_sku = $1
            RETURNING product_sku, stock_level
            "#,
        )
        .bind(sku.as_str())
        .bind(quantity.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("remove", e))?;

        row.as_ref().map(inventory_from_row).transpose()
    }

    #[instrument(skip(self), fields(sku = %sku), err)]
    async fn get(&mut self, sku: &ProductSku) -> Result<Option<Inventory>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT product_sku, stock_level
            FROM inventory
            WHERE product_sku = $1
            "#,
        )
        .bind(sku.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(inventory_from_row).transpose()
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn inventory_from_row(row: &PgRow) -> Result<Inventory, StoreError> {
    let sku: String = row
        .try_get("product_sku")
        .map_err(|e| StoreError::Fault(format!("failed to decode inventory row: {e}")))?;
    let stock_level: i32 = row
        .try_get("stock_level")
        .map_err(|e| StoreError::Fault(format!("failed to decode inventory row: {e}")))?;
    Ok(Inventory::new(ProductSku::from(sku), i64::from(stock_level)))
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned());
            // Class 22 (data exception) and 23 (integrity constraint violation)
            let rejected = code
                .as_deref()
                .is_some_and(|c| c.starts_with("22") || c.starts_with("23"));

            if rejected {
                StoreError::Rejected {
                    code,
                    constraint: db_err.constraint().map(str::to_string),
                    message: db_err.message().to_string(),
                }
            } else {
                StoreError::Fault(format!(
                    "{} failed: {}",
                    operation,
                    db_err.message()
                ))
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Fault(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Fault(format!("timed out acquiring a connection in {operation}"))
        }
        _ => StoreError::Fault(format!("sqlx error in {operation}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_defaults_match_the_deployed_service() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_lifetime, Duration::from_secs(1800));
    }

    #[test]
    fn connectivity_errors_are_faults() {
        let err = map_sqlx_error("begin_transaction", sqlx::Error::PoolClosed);
        assert_eq!(
            err,
            StoreError::Fault("connection pool closed in begin_transaction".into())
        );

        let err = map_sqlx_error("add", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Fault(_)));
    }
}
