use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddCartItemRequest, CartMutation, SetCartItemQtyRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::CartSnapshot,
    response::{ApiResponse, Meta},
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).post(add_item).delete(clear_cart))
        .route("/items/{item_id}", patch(set_item_qty).delete(remove_item))
}

/// Partial acceptance is still a 409 so clients notice the adjustment.
fn mutation_response(mutation: CartMutation) -> (StatusCode, Json<ApiResponse<CartMutation>>) {
    match mutation.conflict {
        Some(conflict) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::success(conflict.message(), mutation, Some(Meta::empty()))),
        ),
        None => (
            StatusCode::OK,
            Json(ApiResponse::success("Cart updated", mutation, Some(Meta::empty()))),
        ),
    }
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Current cart, created on first access", body = ApiResponse<CartSnapshot>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    let cart = cart_service::get_cart(&state, &user).await?;
    Ok(Json(ApiResponse::ok(cart)))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Item added", body = ApiResponse<CartMutation>),
        (status = 409, description = "Partially applied or refused; body carries the cart and reason", body = ApiResponse<CartMutation>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddCartItemRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CartMutation>>)> {
    let mutation = cart_service::add_item(&state, &user, payload).await?;
    Ok(mutation_response(mutation))
}

#[utoipa::path(
    patch,
    path = "/api/cart/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart line id")),
    request_body = SetCartItemQtyRequest,
    responses(
        (status = 200, description = "Quantity set; 0 removes the line", body = ApiResponse<CartMutation>),
        (status = 409, description = "Capped by stock or cart already checked out", body = ApiResponse<CartMutation>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn set_item_qty(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<SetCartItemQtyRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CartMutation>>)> {
    let mutation = cart_service::set_item_qty(&state, &user, item_id, payload.qty).await?;
    Ok(mutation_response(mutation))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart line id")),
    responses(
        (status = 200, description = "Line removed", body = ApiResponse<CartSnapshot>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    let cart = cart_service::remove_item(&state, &user, item_id).await?;
    Ok(Json(ApiResponse::success("Item removed", cart, Some(Meta::empty()))))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart emptied", body = ApiResponse<CartSnapshot>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartSnapshot>>> {
    let cart = cart_service::clear_cart(&state, &user).await?;
    Ok(Json(ApiResponse::success("Cart cleared", cart, Some(Meta::empty()))))
}
