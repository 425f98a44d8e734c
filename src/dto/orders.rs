use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{CartSnapshot, DeliveryAddress, Order, OrderEvent, OrderItem, Payment, PickupSlot},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Option<Payment>,
    pub events: Vec<OrderEvent>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderTimeline {
    pub items: Vec<OrderEvent>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResult {
    pub order: OrderDetail,
    pub cart: CartSnapshot,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeliveryDetailsRequest {
    pub order_id: Uuid,
    pub version: i32,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub phone: String,
}

impl DeliveryDetailsRequest {
    /// Trim and validate into a storable address.
    pub fn into_address(self) -> AppResult<DeliveryAddress> {
        let line1 = bounded("line1", &self.line1, 3, 120)?;
        let line2 = match self.line2.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(value) => Some(bounded("line2", value, 1, 120)?),
        };
        let city = bounded("city", &self.city, 2, 60)?;
        let state = bounded("state", &self.state, 2, 60)?;

        let pincode = self.pincode.trim();
        if pincode.len() != 6 || !pincode.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::validation("pincode must be 6 digits"));
        }

        let phone = self.phone.trim();
        let digits = phone.strip_prefix('+').unwrap_or(phone);
        if !(10..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::validation("phone must be 10 to 15 digits"));
        }

        Ok(DeliveryAddress {
            line1,
            line2,
            city,
            state,
            pincode: pincode.to_string(),
            phone: phone.to_string(),
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PickupDetailsRequest {
    pub order_id: Uuid,
    pub version: i32,
    pub point: String,
    pub slot_start: DateTime<Utc>,
    pub slot_end: DateTime<Utc>,
}

impl PickupDetailsRequest {
    pub fn into_slot(self) -> AppResult<PickupSlot> {
        let point = bounded("point", &self.point, 2, 120)?;
        if self.slot_end <= self.slot_start {
            return Err(AppError::validation("Pickup end must be after start"));
        }
        Ok(PickupSlot {
            point,
            slot_start: self.slot_start,
            slot_end: self.slot_end,
        })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub expected_version: Option<i32>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdminOrderAction {
    MarkReady,
    MarkDelivered,
    Cancel,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminOrderActionRequest {
    pub action: AdminOrderAction,
    pub expected_version: Option<i32>,
}

fn bounded(field: &str, value: &str, min: usize, max: usize) -> AppResult<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(AppError::validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery() -> DeliveryDetailsRequest {
        DeliveryDetailsRequest {
            order_id: Uuid::new_v4(),
            version: 1,
            line1: "  12 Baker Street ".into(),
            line2: Some("   ".into()),
            city: "Pune".into(),
            state: "MH".into(),
            pincode: "411001".into(),
            phone: "+919876543210".into(),
        }
    }

    #[test]
    fn valid_address_is_trimmed() {
        let address = delivery().into_address().unwrap();
        assert_eq!(address.line1, "12 Baker Street");
        assert_eq!(address.line2, None);
        assert_eq!(address.phone, "+919876543210");
    }

    #[test]
    fn rejects_bad_pincode_and_phone() {
        let mut req = delivery();
        req.pincode = "4110".into();
        assert!(matches!(req.into_address(), Err(AppError::Validation(_))));

        let mut req = delivery();
        req.phone = "98765".into();
        assert!(matches!(req.into_address(), Err(AppError::Validation(_))));

        let mut req = delivery();
        req.line1 = "ab".into();
        assert!(matches!(req.into_address(), Err(AppError::Validation(_))));
    }

    #[test]
    fn pickup_slot_must_end_after_start() {
        let start = Utc::now();
        let req = PickupDetailsRequest {
            order_id: Uuid::new_v4(),
            version: 1,
            point: "Main gate".into(),
            slot_start: start,
            slot_end: start,
        };
        assert!(matches!(req.into_slot(), Err(AppError::Validation(_))));
    }

    #[test]
    fn admin_actions_parse_snake_case() {
        let req: AdminOrderActionRequest =
            serde_json::from_str(r#"{"action":"mark_ready","expected_version":4}"#).unwrap();
        assert!(matches!(req.action, AdminOrderAction::MarkReady));
        assert_eq!(req.expected_version, Some(4));
    }
}
