use crate::sku::ProductSku;

/// Removals leaving a SKU strictly below this level raise a low-stock notification.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// One row of the `inventory` table.
///
/// `stock_level` is never negative; the store enforces that with a check
/// constraint rather than the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    pub product_sku: ProductSku,
    pub stock_level: i64,
}

impl Inventory {
    pub fn new(product_sku: ProductSku, stock_level: i64) -> Self {
        Self {
            product_sku,
            stock_level,
        }
    }

    /// A SKU with no history holds zero stock.
    pub fn empty(product_sku: ProductSku) -> Self {
        Self::new(product_sku, 0)
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_level < LOW_STOCK_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_holds_zero() {
        let inv = Inventory::empty(ProductSku::from("sku-1"));
        assert_eq!(inv.stock_level, 0);
        assert_eq!(inv.product_sku.as_str(), "sku-1");
    }

    #[test]
    fn low_stock_is_strictly_below_threshold() {
        let sku = ProductSku::from("sku-1");
        assert!(Inventory::new(sku.clone(), 0).is_low_stock());
        assert!(Inventory::new(sku.clone(), LOW_STOCK_THRESHOLD - 1).is_low_stock());
        assert!(!Inventory::new(sku.clone(), LOW_STOCK_THRESHOLD).is_low_stock());
        assert!(!Inventory::new(sku, 250).is_low_stock());
    }
}
