//! Postgres store against a live database.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p stockroom-infra --test postgres_store -- --ignored

use stockroom_infra::store::{InventoryStore, InventoryTx, PoolConfig, PostgresInventoryStore};
use stockroom_inventory::{PRODUCT_SKU_FORMAT, ProductSku, Quantity, STOCK_LEVEL_NONNEGATIVE};

async fn store() -> PostgresInventoryStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let store = PostgresInventoryStore::connect(&url, PoolConfig::default())
        .await
        .expect("connect");
    sqlx::raw_sql(include_str!("../../../migrations/20250101000000_create_inventory.sql"))
        .execute(store.pool())
        .await
        .expect("migrate");
    store
}

fn unique_sku() -> ProductSku {
    ProductSku::new(format!("it-{}", uuid::Uuid::now_v7().simple()))
}

fn qty(n: i64) -> Quantity {
    Quantity::new(n).unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn add_then_get_round_trips_through_commit() {
    let store = store().await;
    let sku = unique_sku();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.add(&sku, qty(4)).await.unwrap().stock_level, 4);
    assert_eq!(tx.add(&sku, qty(6)).await.unwrap().stock_level, 10);
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.get(&sku).await.unwrap().map(|i| i.stock_level), Some(10));
    tx.rollback().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn over_removal_reports_the_nonnegative_constraint() {
    let store = store().await;
    let sku = unique_sku();

    let mut tx = store.begin().await.unwrap();
    tx.add(&sku, qty(10)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx.remove(&sku, qty(11)).await.unwrap_err();
    assert!(err.is_check_violation());
    assert_eq!(err.constraint(), Some(STOCK_LEVEL_NONNEGATIVE));
    tx.rollback().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.get(&sku).await.unwrap().map(|i| i.stock_level), Some(10));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn malformed_sku_reports_the_format_constraint() {
    let store = store().await;

    let mut tx = store.begin().await.unwrap();
    let err = tx.add(&ProductSku::from("$$-1"), qty(1)).await.unwrap_err();
    assert_eq!(err.constraint(), Some(PRODUCT_SKU_FORMAT));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn removing_an_unknown_sku_updates_nothing() {
    let store = store().await;

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.remove(&unique_sku(), qty(1)).await.unwrap(), None);
}
