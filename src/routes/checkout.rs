use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::orders::{CheckoutResult, DeliveryDetailsRequest, OrderDetail, PickupDetailsRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_checkout))
        .route("/delivery", post(set_delivery_details))
        .route("/pickup", post(set_pickup_details))
}

#[utoipa::path(
    post,
    path = "/api/checkout/start",
    responses(
        (status = 200, description = "Cart became a pending order", body = ApiResponse<CheckoutResult>),
        (status = 409, description = "Empty cart, already checked out, or insufficient stock")
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn start_checkout(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CheckoutResult>>> {
    let result = checkout_service::start_checkout(&state, &user).await?;
    Ok(Json(ApiResponse::success("Checkout started", result, Some(Meta::empty()))))
}

#[utoipa::path(
    post,
    path = "/api/checkout/delivery",
    request_body = DeliveryDetailsRequest,
    responses(
        (status = 200, description = "Delivery address stored", body = ApiResponse<OrderDetail>),
        (status = 409, description = "Order not pending or stale version"),
        (status = 422, description = "Invalid address")
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn set_delivery_details(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<DeliveryDetailsRequest>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = checkout_service::set_delivery_details(&state, &user, payload).await?;
    Ok(Json(ApiResponse::success("Delivery details saved", order, Some(Meta::empty()))))
}

#[utoipa::path(
    post,
    path = "/api/checkout/pickup",
    request_body = PickupDetailsRequest,
    responses(
        (status = 200, description = "Pickup slot stored", body = ApiResponse<OrderDetail>),
        (status = 409, description = "Order not pending or stale version"),
        (status = 422, description = "Invalid pickup slot")
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn set_pickup_details(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PickupDetailsRequest>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = checkout_service::set_pickup_details(&state, &user, payload).await?;
    Ok(Json(ApiResponse::success("Pickup details saved", order, Some(Meta::empty()))))
}
