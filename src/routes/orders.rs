use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{CancelOrderRequest, OrderDetail, OrderList, OrderTimeline},
    error::AppResult,
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/events", get(get_order_events))
        .route("/{id}/cancel", post(cancel_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Caller's orders, newest first by default", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let (items, meta) = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(ApiResponse::success("Ok", OrderList { items }, Some(meta))))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order snapshot", body = ApiResponse<OrderDetail>),
        (status = 403, description = "Not the caller's order"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = order_service::get_order(&state, &user, id).await?;
    Ok(Json(ApiResponse::ok(order)))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}/events",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order timeline, oldest first", body = ApiResponse<OrderTimeline>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order_events(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderTimeline>>> {
    let items = order_service::get_order_events(&state, &user, id).await?;
    Ok(Json(ApiResponse::ok(OrderTimeline { items })))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order canceled, or already canceled", body = ApiResponse<OrderDetail>),
        (status = 409, description = "Order not pending or stale version")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<CancelOrderRequest>>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let expected_version = payload.and_then(|Json(p)| p.expected_version);
    let order = order_service::cancel_order(&state, &user, id, expected_version).await?;
    Ok(Json(ApiResponse::success("Order canceled", order, Some(Meta::empty()))))
}
