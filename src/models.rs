use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub use crate::entity::sea_orm_active_enums::{FulfillmentType, OrderStatus, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeliveryAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PickupSlot {
    pub point: String,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
}

/// How a pending order will be handed over. Delivery and pickup details are
/// mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fulfillment {
    Delivery(DeliveryAddress),
    Pickup(PickupSlot),
}

impl Fulfillment {
    pub fn kind(&self) -> FulfillmentType {
        match self {
            Fulfillment::Delivery(_) => FulfillmentType::Delivery,
            Fulfillment::Pickup(_) => FulfillmentType::Pickup,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub version: i32,
    pub fulfillment: Option<Fulfillment>,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub currency: String,
    pub invoice_no: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<String>,
    pub qty: i32,
    pub unit_price: i64,
    pub line_total: i64,
    pub currency: String,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Payment {
    pub status: PaymentStatus,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderEvent {
    pub id: i64,
    pub event_type: String,
    pub at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    #[schema(value_type = Option<Object>)]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub variant_id: Option<String>,
    pub qty: i32,
    pub unit_price: i64,
    pub line_total: i64,
    pub currency: String,
    /// Stock at the time the snapshot was taken.
    pub stock: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartSnapshot {
    pub order_id: Uuid,
    pub currency: String,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub item_count: i64,
    pub items: Vec<CartLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub item_count: i64,
}

impl Totals {
    /// Tax is flat zero here; pricing rules belong to the caller.
    pub fn compute<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (i32, i64)>,
    {
        let (subtotal, item_count) = lines
            .into_iter()
            .fold((0i64, 0i64), |(sum, count), (qty, unit_price)| {
                (sum + i64::from(qty) * unit_price, count + i64::from(qty))
            });
        let tax = 0;
        Self {
            subtotal,
            tax,
            total: subtotal + tax,
            item_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_lines_and_keep_total_consistent() {
        let totals = Totals::compute([(2, 500), (1, 1250), (3, 99)]);
        assert_eq!(totals.subtotal, 2 * 500 + 1250 + 3 * 99);
        assert_eq!(totals.tax, 0);
        assert_eq!(totals.total, totals.subtotal + totals.tax);
        assert_eq!(totals.item_count, 6);
    }

    #[test]
    fn empty_cart_totals_are_zero() {
        assert_eq!(Totals::compute(Vec::<(i32, i64)>::new()), Totals::default());
    }

    #[test]
    fn fulfillment_serializes_as_tagged_variant() {
        let pickup = Fulfillment::Pickup(PickupSlot {
            point: "Main gate".into(),
            slot_start: DateTime::parse_from_rfc3339("2025-01-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            slot_end: DateTime::parse_from_rfc3339("2025-01-01T11:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        });
        let json = serde_json::to_value(&pickup).unwrap();
        assert_eq!(json["type"], "pickup");
        assert_eq!(json["point"], "Main gate");
        assert_eq!(pickup.kind(), FulfillmentType::Pickup);
    }
}
