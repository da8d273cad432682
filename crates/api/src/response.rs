//! Reply rendering.
//!
//! Internally a reply is a two-variant enum; on the wire it keeps the flat
//! shape existing consumers read: `{ok, product-sku?, quantity?, error?}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::ServiceError;
use stockroom_inventory::{Inventory, ProductSku};

use crate::scope::Stage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireResponse", try_from = "WireResponse")]
pub enum StockResponse {
    Success { sku: ProductSku, quantity: i64 },
    Failure { message: String },
}

impl StockResponse {
    pub fn success(inventory: Inventory) -> Self {
        Self::Success {
            sku: inventory.product_sku,
            quantity: inventory.stock_level,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// A recorded error always wins over the stage outcome.
    pub fn build(outcome: Stage<Inventory>, error: Option<&ServiceError>) -> Self {
        match (error, outcome) {
            (Some(err), _) => Self::failure(err.to_string()),
            (None, Ok(inventory)) => Self::success(inventory),
            (None, Err(_)) => Self::failure("request halted without a recorded error"),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Flat wire form of [`StockResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireResponse {
    pub ok: bool,
    #[serde(rename = "product-sku", default, skip_serializing_if = "Option::is_none")]
    pub product_sku: Option<ProductSku>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
#[error("malformed stock response: {0}")]
pub struct MalformedResponse(&'static str);

impl From<StockResponse> for WireResponse {
    fn from(value: StockResponse) -> Self {
        match value {
            StockResponse::Success { sku, quantity } => Self {
                ok: true,
                product_sku: Some(sku),
                quantity: Some(quantity),
                error: None,
            },
            StockResponse::Failure { message } => Self {
                ok: false,
                product_sku: None,
                quantity: None,
                error: Some(message),
            },
        }
    }
}

impl TryFrom<WireResponse> for StockResponse {
    type Error = MalformedResponse;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        match wire {
            WireResponse {
                ok: true,
                product_sku: Some(sku),
                quantity: Some(quantity),
                error: None,
            } => Ok(Self::Success { sku, quantity }),
            WireResponse {
                ok: false,
                product_sku: None,
                quantity: None,
                error: Some(message),
            } => Ok(Self::Failure { message }),
            WireResponse { ok: true, .. } => Err(MalformedResponse("success must carry product-sku and quantity only")),
            WireResponse { ok: false, .. } => Err(MalformedResponse("failure must carry error only")),
        }
    }
}
