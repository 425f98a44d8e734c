use chrono::Utc;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, TransactionTrait,
    sea_query::Expr,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutResult, DeliveryDetailsRequest, OrderDetail, PickupDetailsRequest},
    entity::orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    event_log::record_event,
    lifecycle::{self, Action, Actor},
    middleware::auth::AuthUser,
    models::{Fulfillment, OrderStatus},
    services::{
        cart_service::{get_or_create_active_cart, refresh_cart},
        inventory::{assert_sufficient_stock, demand},
        order_service::{
            expected_version, fulfillment_changes, increment_order_version, load_order_detail,
            lock_order,
        },
    },
    state::AppState,
};

/// Turn the caller's cart into a pending order and open a fresh cart.
///
/// Stock is validated against current levels but not reserved; the decrement
/// happens when payment is captured.
pub async fn start_checkout(state: &AppState, user: &AuthUser) -> AppResult<CheckoutResult> {
    let actor = Actor::Owner(user.user_id);
    let txn = state.orm.begin().await?;

    let cart = get_or_create_active_cart(&txn, user.user_id, &state.config.default_currency).await?;
    lifecycle::authorize(cart.status, Action::Checkout, &actor)?;
    let (cart, snapshot) = refresh_cart(&txn, cart).await?;
    if snapshot.items.is_empty() {
        return Err(AppError::state("Cart is empty"));
    }

    let wanted = demand(snapshot.items.iter().map(|line| (line.product_id, line.qty)));
    assert_sufficient_stock(&txn, &wanted).await?;

    let changes = OrderActive {
        status: Set(OrderStatus::Pending),
        cart_user_id: Set(None),
        updated_at: Set(Utc::now().into()),
        ..fulfillment_changes(None)
    };
    let result = Orders::update_many()
        .set(changes)
        .col_expr(OrderCol::Version, Expr::col(OrderCol::Version).add(1))
        .filter(OrderCol::Id.eq(cart.id))
        .filter(OrderCol::Status.eq(OrderStatus::Cart))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        tracing::warn!(order_id = %cart.id, "checkout lost race");
        return Err(AppError::state("Cart already checked out"));
    }

    record_event(
        &txn,
        cart.id,
        Action::Checkout.event_type(&actor),
        actor.user_id(),
        Some(json!({
            "subtotal": snapshot.subtotal,
            "total": snapshot.total,
            "currency": snapshot.currency,
        })),
    )
    .await?;

    let order = lock_order(&txn, cart.id).await?;
    let detail = load_order_detail(&txn, order).await?;

    let fresh = get_or_create_active_cart(&txn, user.user_id, &state.config.default_currency).await?;
    let (_, fresh) = refresh_cart(&txn, fresh).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %detail.order.id,
        version = detail.order.version,
        total = detail.order.total,
        "checkout started"
    );
    Ok(CheckoutResult {
        order: detail,
        cart: fresh,
    })
}

async fn set_fulfillment<C>(
    conn: &C,
    user: &AuthUser,
    order_id: Uuid,
    version: i32,
    fulfillment: Fulfillment,
) -> AppResult<OrderDetail>
where
    C: ConnectionTrait,
{
    let order = lock_order(conn, order_id).await?;
    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    if order.status != OrderStatus::Pending {
        return Err(AppError::state(
            "Fulfillment details can only be set on pending orders",
        ));
    }
    let expected = expected_version(&order, Some(version))?;

    let event_type = match fulfillment {
        Fulfillment::Delivery(_) => "fulfillment_delivery_set",
        Fulfillment::Pickup(_) => "fulfillment_pickup_set",
    };
    let meta = serde_json::to_value(&fulfillment)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let updated =
        increment_order_version(conn, order.id, expected, fulfillment_changes(Some(&fulfillment)))
            .await?;
    record_event(conn, updated.id, event_type, Some(user.user_id), Some(meta)).await?;

    tracing::info!(%order_id, version = updated.version, event_type, "fulfillment updated");
    load_order_detail(conn, updated).await
}

pub async fn set_delivery_details(
    state: &AppState,
    user: &AuthUser,
    payload: DeliveryDetailsRequest,
) -> AppResult<OrderDetail> {
    let (order_id, version) = (payload.order_id, payload.version);
    let address = payload.into_address()?;

    let txn = state.orm.begin().await?;
    let detail = set_fulfillment(&txn, user, order_id, version, Fulfillment::Delivery(address)).await?;
    txn.commit().await?;
    Ok(detail)
}

pub async fn set_pickup_details(
    state: &AppState,
    user: &AuthUser,
    payload: PickupDetailsRequest,
) -> AppResult<OrderDetail> {
    let (order_id, version) = (payload.order_id, payload.version);
    let slot = payload.into_slot()?;

    let txn = state.orm.begin().await?;
    let detail = set_fulfillment(&txn, user, order_id, version, Fulfillment::Pickup(slot)).await?;
    txn.commit().await?;
    Ok(detail)
}
