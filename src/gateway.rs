use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::{
    config::{AppConfig, GatewayCredentials},
    error::{AppError, AppResult},
};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    id: String,
}

/// Client for the single external payment gateway.
#[derive(Clone)]
pub struct PaymentGateway {
    client: Client,
    base_url: String,
    credentials: Option<GatewayCredentials>,
}

impl PaymentGateway {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.gateway_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.gateway_base_url.trim_end_matches('/').to_string(),
            credentials: config.gateway_credentials.clone(),
        })
    }

    /// Without credentials gateway order ids are minted locally.
    pub fn test_mode(&self) -> bool {
        self.credentials.is_none()
    }

    pub fn key_id(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.key_id.as_str())
    }

    /// Register an order with the gateway and return its external order id.
    pub async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> AppResult<String> {
        let Some(credentials) = &self.credentials else {
            return Ok(mint_test_order_id());
        };

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&credentials.key_id, Some(&credentials.key_secret))
            .json(&CreateOrderRequest {
                amount,
                currency,
                receipt,
                payment_capture: 1,
            })
            .send()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "create order failed ({})",
                response.status()
            )));
        }

        let body: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;
        Ok(body.id)
    }
}

fn mint_test_order_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("order_{}", &hex[..16])
}

/// Check `signature` (lowercase hex HMAC-SHA256 of `body`) against `secret`.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> AppResult<()> {
    let expected = hex::decode(signature.trim())
        .map_err(|_| AppError::SignatureInvalid("Invalid payment signature".into()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::SignatureInvalid("Invalid payment signature".into()))
}

/// Hex HMAC-SHA256 of `body`, the format the gateway signs webhooks with.
pub fn sign(secret: &str, body: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}
