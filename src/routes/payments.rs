use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    routing::post,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    dto::{
        orders::OrderDetail,
        payments::{CreatePaymentIntentRequest, PaymentIntent, WebhookIds},
    },
    error::{AppError, AppResult},
    gateway::SIGNATURE_HEADER,
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::payment_service::{self, FinalizePayment, PaymentSource},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/intent", post(create_intent))
        .route("/webhook", post(payment_webhook))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WebhookQuery {
    /// Ignored in production.
    pub skip_signature: Option<bool>,
}

#[utoipa::path(
    post,
    path = "/api/payments/intent",
    request_body = CreatePaymentIntentRequest,
    responses(
        (status = 200, description = "Gateway order for the pending order", body = ApiResponse<PaymentIntent>),
        (status = 409, description = "Order not payable or insufficient stock"),
        (status = 502, description = "Gateway unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_intent(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePaymentIntentRequest>,
) -> AppResult<Json<ApiResponse<PaymentIntent>>> {
    let intent = payment_service::create_payment_intent(&state, &user, payload.order_id).await?;
    Ok(Json(ApiResponse::ok(intent)))
}

#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    params(WebhookQuery),
    request_body(
        content = String,
        content_type = "application/json",
        description = "Raw gateway confirmation, flat or nested payload"
    ),
    responses(
        (status = 200, description = "Payment captured, or already captured", body = ApiResponse<OrderDetail>),
        (status = 401, description = "Signature missing or invalid"),
        (status = 404, description = "Unknown gateway order"),
        (status = 409, description = "Order not pending or stock exhausted")
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Invalid JSON body".into()))?;
    let ids = WebhookIds::from_payload(&payload)
        .ok_or_else(|| AppError::validation("Missing payment identifiers"))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or(ids.body_signature);
    let source = if state.config.webhook_secret.is_some() {
        PaymentSource::Webhook
    } else {
        PaymentSource::Manual
    };

    let order = payment_service::finalize_payment(
        &state,
        FinalizePayment {
            gateway_order_id: ids.gateway_order_id,
            gateway_payment_id: ids.gateway_payment_id,
            signature,
            raw_body: body.to_vec(),
            skip_signature_check: query.skip_signature.unwrap_or(false),
            source,
        },
    )
    .await?;
    Ok(Json(ApiResponse::success("Payment recorded", order, Some(Meta::empty()))))
}
