use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest SKU accepted by the schema and the store's format check.
pub const SKU_MAX_LEN: usize = 64;

/// Product stock keeping unit; the unique key of an inventory record.
///
/// Decoding does not reject malformed SKUs: format is enforced by the request
/// schema at the edge and by the store's `inventory_product_sku_format` check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductSku(String);

impl ProductSku {
    pub fn new(sku: impl Into<String>) -> Self {
        Self(sku.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the SKU matches `^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$`.
    pub fn is_well_formed(&self) -> bool {
        let mut chars = self.0.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        self.0.len() <= SKU_MAX_LEN
            && first.is_ascii_alphanumeric()
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    }
}

impl core::fmt::Display for ProductSku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductSku {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProductSku {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ProductSku {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("quantity must be between 1 and {}, got {0}", i32::MAX)]
pub struct InvalidQuantity(pub i64);

/// A strictly positive count of units, bounded by the store's integer column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i32);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, InvalidQuantity> {
        Self::try_from(value)
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = InvalidQuantity;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match i32::try_from(value) {
            Ok(v) if v > 0 => Ok(Self(v)),
            _ => Err(InvalidQuantity(value)),
        }
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        i64::from(value.0)
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
