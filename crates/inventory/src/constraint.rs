//! Store-level rules on the `inventory` table and their caller-facing wording.
//!
//! The store reports a violated check by the constraint's stable name. The
//! translation below keys on that identity only; the store's own message text
//! is passed through solely for constraints this table does not know about.

use crate::sku::ProductSku;

/// SQLSTATE for `check_violation`.
pub const CHECK_VIOLATION: &str = "23514";

/// `CHECK (stock_level >= 0)`
pub const STOCK_LEVEL_NONNEGATIVE: &str = "inventory_stock_level_nonnegative";

/// `CHECK (product_sku ~ '^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$')`
pub const PRODUCT_SKU_FORMAT: &str = "inventory_product_sku_format";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InventoryConstraint {
    StockLevelNonnegative,
    SkuFormat,
    Other,
}

impl InventoryConstraint {
    pub fn from_identity(name: Option<&str>) -> Self {
        match name {
            Some(STOCK_LEVEL_NONNEGATIVE) => Self::StockLevelNonnegative,
            Some(PRODUCT_SKU_FORMAT) => Self::SkuFormat,
            _ => Self::Other,
        }
    }

    pub fn identity(self) -> Option<&'static str> {
        match self {
            Self::StockLevelNonnegative => Some(STOCK_LEVEL_NONNEGATIVE),
            Self::SkuFormat => Some(PRODUCT_SKU_FORMAT),
            Self::Other => None,
        }
    }

    pub fn caller_message(self, sku: &ProductSku, store_message: &str) -> String {
        match self {
            Self::StockLevelNonnegative => format!("stock level cannot go below zero for {sku}"),
            Self::SkuFormat => format!("invalid SKU format: {sku}"),
            Self::Other => format!("business rule violated: {store_message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_identities_round_trip() {
        for c in [InventoryConstraint::StockLevelNonnegative, InventoryConstraint::SkuFormat] {
            assert_eq!(InventoryConstraint::from_identity(c.identity()), c);
        }
        assert_eq!(InventoryConstraint::from_identity(None), InventoryConstraint::Other);
        assert_eq!(
            InventoryConstraint::from_identity(Some("inventory_something_else")),
            InventoryConstraint::Other
        );
    }

    #[test]
    fn messages_ignore_store_text_for_known_constraints() {
        let sku = ProductSku::from("sku-1");
        let noise = "new row for relation \"inventory\" violates check constraint";
        assert_eq!(
            InventoryConstraint::StockLevelNonnegative.caller_message(&sku, noise),
            "stock level cannot go below zero for sku-1"
        );
        assert_eq!(
            InventoryConstraint::SkuFormat.caller_message(&sku, noise),
            "invalid SKU format: sku-1"
        );
        assert_eq!(
            InventoryConstraint::Other.caller_message(&sku, "value too large"),
            "business rule violated: value too large"
        );
    }
}
