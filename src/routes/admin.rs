use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{AdminOrderActionRequest, OrderDetail, OrderList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin))
        .route("/orders/{id}/actions", post(order_action))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "All orders", body = ApiResponse<OrderList>),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let (items, meta) = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(ApiResponse::success("Ok", OrderList { items }, Some(meta))))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order snapshot", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order = admin_service::get_order_admin(&state, &user, id).await?;
    Ok(Json(ApiResponse::ok(order)))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/actions",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = AdminOrderActionRequest,
    responses(
        (status = 200, description = "Transition applied, or already in the target state", body = ApiResponse<OrderDetail>),
        (status = 409, description = "Wrong prior state or stale version")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn order_action(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminOrderActionRequest>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let order =
        admin_service::run_action(&state, &user, id, payload.action, payload.expected_version)
            .await?;
    Ok(Json(ApiResponse::success("Order updated", order, Some(Meta::empty()))))
}
