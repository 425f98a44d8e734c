use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    dto::orders::{AdminOrderAction, OrderDetail},
    entity::orders::Entity as Orders,
    error::{AppError, AppResult},
    lifecycle::{Action, Actor},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderStatus},
    response::Meta,
    routes::params::OrderListQuery,
    services::order_service::{apply_transition, load_order_detail, query_orders},
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    admin: &AuthUser,
    query: OrderListQuery,
) -> AppResult<(Vec<Order>, Meta)> {
    ensure_admin(admin)?;
    query_orders(state, None, query).await
}

pub async fn get_order_admin(state: &AppState, admin: &AuthUser, order_id: Uuid) -> AppResult<OrderDetail> {
    ensure_admin(admin)?;
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .filter(|o| o.status != OrderStatus::Cart)
        .ok_or_else(|| AppError::not_found("Order"))?;
    load_order_detail(&state.orm, order).await
}

pub async fn mark_ready(
    state: &AppState,
    admin: &AuthUser,
    order_id: Uuid,
    expected_version: Option<i32>,
) -> AppResult<OrderDetail> {
    ensure_admin(admin)?;
    apply_transition(state, order_id, Action::MarkReady, Actor::from_user(admin), expected_version).await
}

pub async fn mark_delivered(
    state: &AppState,
    admin: &AuthUser,
    order_id: Uuid,
    expected_version: Option<i32>,
) -> AppResult<OrderDetail> {
    ensure_admin(admin)?;
    apply_transition(state, order_id, Action::MarkDelivered, Actor::from_user(admin), expected_version)
        .await
}

pub async fn cancel_as_admin(
    state: &AppState,
    admin: &AuthUser,
    order_id: Uuid,
    expected_version: Option<i32>,
) -> AppResult<OrderDetail> {
    ensure_admin(admin)?;
    apply_transition(state, order_id, Action::Cancel, Actor::from_user(admin), expected_version).await
}

pub async fn run_action(
    state: &AppState,
    admin: &AuthUser,
    order_id: Uuid,
    action: AdminOrderAction,
    expected_version: Option<i32>,
) -> AppResult<OrderDetail> {
    match action {
        AdminOrderAction::MarkReady => mark_ready(state, admin, order_id, expected_version).await,
        AdminOrderAction::MarkDelivered => {
            mark_delivered(state, admin, order_id, expected_version).await
        }
        AdminOrderAction::Cancel => cancel_as_admin(state, admin, order_id, expected_version).await,
    }
}
