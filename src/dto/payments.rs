use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::PaymentStatus;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentIntentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentIntent {
    pub order_id: Uuid,
    pub gateway_order_id: String,
    pub amount: i64,
    pub currency: String,
    pub key_id: Option<String>,
    pub status: PaymentStatus,
    pub test_mode: bool,
}

/// Identifiers pulled out of a gateway confirmation body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookIds {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub body_signature: Option<String>,
}

impl WebhookIds {
    /// Accepts the checkout callback shape
    /// (`razorpay_order_id`, `razorpay_payment_id`, `razorpay_signature`) and
    /// the webhook event shape (`payload.payment.entity.{order_id,id}`).
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let entity = payload.pointer("/payload/payment/entity");
        let gateway_order_id = payload
            .get("razorpay_order_id")
            .and_then(Value::as_str)
            .or_else(|| entity.and_then(|e| e.get("order_id")).and_then(Value::as_str))?;
        let gateway_payment_id = payload
            .get("razorpay_payment_id")
            .and_then(Value::as_str)
            .or_else(|| entity.and_then(|e| e.get("id")).and_then(Value::as_str))?;
        let body_signature = payload
            .get("razorpay_signature")
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self {
            gateway_order_id: gateway_order_id.to_string(),
            gateway_payment_id: gateway_payment_id.to_string(),
            body_signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_flat_callback_payload() {
        let ids = WebhookIds::from_payload(&json!({
            "razorpay_order_id": "order_abc",
            "razorpay_payment_id": "pay_123",
            "razorpay_signature": "deadbeef"
        }))
        .unwrap();
        assert_eq!(ids.gateway_order_id, "order_abc");
        assert_eq!(ids.gateway_payment_id, "pay_123");
        assert_eq!(ids.body_signature.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn reads_nested_event_payload() {
        let ids = WebhookIds::from_payload(&json!({
            "event": "payment.captured",
            "payload": { "payment": { "entity": { "id": "pay_123", "order_id": "order_abc" } } }
        }))
        .unwrap();
        assert_eq!(ids.gateway_order_id, "order_abc");
        assert_eq!(ids.gateway_payment_id, "pay_123");
        assert_eq!(ids.body_signature, None);
    }

    #[test]
    fn missing_ids_yield_none() {
        assert!(WebhookIds::from_payload(&json!({ "razorpay_order_id": "order_abc" })).is_none());
        assert!(WebhookIds::from_payload(&json!([])).is_none());
    }
}
