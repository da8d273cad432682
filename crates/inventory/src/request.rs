//! Typed request values decoded from validated payloads.

use serde::{Deserialize, Serialize};

use crate::sku::{ProductSku, Quantity};

/// Request: add `quantity` units of `sku`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRequest {
    #[serde(rename = "product-sku")]
    pub sku: ProductSku,
    pub quantity: Quantity,
}

/// Request: remove `quantity` units of `sku`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRequest {
    #[serde(rename = "product-sku")]
    pub sku: ProductSku,
    pub quantity: Quantity,
}

/// Request: read the stock level of `sku`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    #[serde(rename = "product-sku")]
    pub sku: ProductSku,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_field_names() {
        let req: AddRequest =
            serde_json::from_str(r#"{"product-sku":"sku-1","quantity":10}"#).unwrap();
        assert_eq!(req.sku, ProductSku::from("sku-1"));
        assert_eq!(req.quantity.get(), 10);

        let req: GetRequest = serde_json::from_str(r#"{"product-sku":"sku-2"}"#).unwrap();
        assert_eq!(req.sku.as_str(), "sku-2");
    }

    #[test]
    fn zero_quantity_fails_to_decode() {
        let err = serde_json::from_str::<RemoveRequest>(r#"{"product-sku":"sku-1","quantity":0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("quantity must be between 1"));
    }

    #[test]
    fn missing_sku_fails_to_decode() {
        assert!(serde_json::from_str::<GetRequest>("{}").is_err());
    }
}
