use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::CartSnapshot;

fn default_qty() -> i32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<String>,
    #[serde(default = "default_qty")]
    pub qty: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetCartItemQtyRequest {
    pub qty: i32,
}

/// Why a cart mutation could only be partially applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CartConflict {
    CurrencyMismatch,
    OutOfStock,
    InsufficientStock,
}

impl CartConflict {
    pub fn message(&self) -> &'static str {
        match self {
            CartConflict::CurrencyMismatch => "Cart already holds items in another currency",
            CartConflict::OutOfStock => "Product is out of stock",
            CartConflict::InsufficientStock => "Quantity reduced to available stock",
        }
    }
}

/// Result of a cart write: the cart as persisted, the quantity now on the
/// affected line, and the reason when that is less than asked for.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartMutation {
    pub cart: CartSnapshot,
    pub qty_accepted: i32,
    #[serde(rename = "reason", skip_serializing_if = "Option::is_none")]
    pub conflict: Option<CartConflict>,
}
