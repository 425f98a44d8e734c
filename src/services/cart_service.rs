use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbBackend, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait, sea_query::LockType,
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddCartItemRequest, CartConflict, CartMutation},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartLine, CartSnapshot, OrderStatus, Totals},
    services::inventory::to_minor_units,
    state::AppState,
};

async fn find_active_cart<C>(conn: &C, user_id: Uuid) -> AppResult<Option<OrderModel>>
where
    C: ConnectionTrait,
{
    Ok(Orders::find()
        .filter(OrderCol::CartUserId.eq(user_id))
        .filter(OrderCol::Status.eq(OrderStatus::Cart))
        .lock(LockType::Update)
        .one(conn)
        .await?)
}

/// The caller's single open cart, row-locked for the rest of `conn`'s
/// transaction. Concurrent first calls converge on one row through the unique
/// `cart_user_id`.
pub async fn get_or_create_active_cart<C>(
    conn: &C,
    user_id: Uuid,
    currency: &str,
) -> AppResult<OrderModel>
where
    C: ConnectionTrait,
{
    if let Some(cart) = find_active_cart(conn, user_id).await? {
        return Ok(cart);
    }

    conn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        INSERT INTO orders (id, user_id, cart_user_id, status, version, subtotal, tax, total, currency)
        VALUES ($1, $2, $2, 'cart', 0, 0, 0, 0, $3)
        ON CONFLICT (cart_user_id) DO NOTHING
        "#,
        [Uuid::new_v4().into(), user_id.into(), currency.into()],
    ))
    .await?;

    find_active_cart(conn, user_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("active cart missing for user {user_id}")))
}

/// Lines with their current product data. Stored totals that disagree with
/// the lines are rewritten.
pub async fn refresh_cart<C>(conn: &C, cart: OrderModel) -> AppResult<(OrderModel, CartSnapshot)>
where
    C: ConnectionTrait,
{
    let rows = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(cart.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .order_by_asc(OrderItemCol::Id)
        .find_also_related(Products)
        .all(conn)
        .await?;

    let totals = Totals::compute(rows.iter().map(|(item, _)| (item.qty, item.unit_price)));
    let cart = if (cart.subtotal, cart.tax, cart.total) != (totals.subtotal, totals.tax, totals.total)
    {
        let mut active: OrderActive = cart.into();
        active.subtotal = Set(totals.subtotal);
        active.tax = Set(totals.tax);
        active.total = Set(totals.total);
        active.updated_at = Set(Utc::now().into());
        active.update(conn).await?
    } else {
        cart
    };

    let items = rows
        .into_iter()
        .map(|(item, product)| CartLine {
            item_id: item.id,
            product_id: item.product_id,
            product_name: product.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
            variant_id: item.variant_id,
            qty: item.qty,
            unit_price: item.unit_price,
            line_total: i64::from(item.qty) * item.unit_price,
            currency: item.currency,
            stock: product.map_or(0, |p| p.stock),
        })
        .collect();

    let snapshot = CartSnapshot {
        order_id: cart.id,
        currency: cart.currency.clone(),
        subtotal: totals.subtotal,
        tax: totals.tax,
        total: totals.total,
        item_count: totals.item_count,
        items,
    };
    Ok((cart, snapshot))
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<CartSnapshot> {
    let txn = state.orm.begin().await?;
    let cart = get_or_create_active_cart(&txn, user.user_id, &state.config.default_currency).await?;
    let (_, snapshot) = refresh_cart(&txn, cart).await?;
    txn.commit().await?;
    Ok(snapshot)
}

async fn find_line<C>(
    conn: &C,
    order_id: Uuid,
    product_id: Uuid,
    variant_id: Option<&str>,
) -> AppResult<Option<OrderItemModel>>
where
    C: ConnectionTrait,
{
    let variant = match variant_id {
        Some(v) => Condition::all().add(OrderItemCol::VariantId.eq(v)),
        None => Condition::all().add(OrderItemCol::VariantId.is_null()),
    };
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .filter(OrderItemCol::ProductId.eq(product_id))
        .filter(variant)
        .one(conn)
        .await?)
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddCartItemRequest,
) -> AppResult<CartMutation> {
    if payload.qty < 1 {
        return Err(AppError::validation("qty must be at least 1"));
    }
    let variant_id = payload
        .variant_id
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let txn = state.orm.begin().await?;
    let cart = get_or_create_active_cart(&txn, user.user_id, &state.config.default_currency).await?;

    let product = Products::find_by_id(payload.product_id)
        .one(&txn)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::not_found("Product"))?;

    let existing = find_line(&txn, cart.id, product.id, variant_id.as_deref()).await?;
    let existing_qty = existing.as_ref().map_or(0, |line| line.qty);
    let line_count = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(cart.id))
        .count(&txn)
        .await?;

    let refused = if line_count > 0 && cart.currency != product.currency {
        Some(CartConflict::CurrencyMismatch)
    } else if product.stock <= 0 {
        Some(CartConflict::OutOfStock)
    } else {
        None
    };
    if let Some(conflict) = refused {
        let (_, snapshot) = refresh_cart(&txn, cart).await?;
        txn.commit().await?;
        tracing::warn!(user_id = %user.user_id, product_id = %product.id, ?conflict, "cart add refused");
        return Ok(CartMutation {
            cart: snapshot,
            qty_accepted: existing_qty,
            conflict: Some(conflict),
        });
    }

    let cart = if line_count == 0 && cart.currency != product.currency {
        let mut active: OrderActive = cart.into();
        active.currency = Set(product.currency.clone());
        active.update(&txn).await?
    } else {
        cart
    };

    let desired = existing_qty.saturating_add(payload.qty);
    let accepted = desired.min(product.stock);
    let unit_price = to_minor_units(product.price)?;
    let now = Utc::now();

    match existing {
        Some(line) => {
            let mut active: OrderItemActive = line.into();
            active.qty = Set(accepted);
            active.unit_price = Set(unit_price);
            active.currency = Set(product.currency.clone());
            active.captured_at = Set(now.into());
            active.update(&txn).await?;
        }
        None => {
            OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(cart.id),
                product_id: Set(product.id),
                variant_id: Set(variant_id),
                qty: Set(accepted),
                unit_price: Set(unit_price),
                currency: Set(product.currency.clone()),
                captured_at: Set(now.into()),
                created_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;
        }
    }

    let (_, snapshot) = refresh_cart(&txn, cart).await?;
    txn.commit().await?;

    let conflict = (accepted < desired).then_some(CartConflict::InsufficientStock);
    tracing::debug!(user_id = %user.user_id, product_id = %product.id, accepted, desired, "cart item added");
    Ok(CartMutation {
        cart: snapshot,
        qty_accepted: accepted,
        conflict,
    })
}

/// Lock the cart owning `item_id` and re-read the line under that lock.
async fn locked_line<C>(conn: &C, user: &AuthUser, item_id: Uuid) -> AppResult<(OrderModel, OrderItemModel)>
where
    C: ConnectionTrait,
{
    let item = OrderItems::find_by_id(item_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Cart item"))?;

    let order = Orders::find_by_id(item.order_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .filter(|o| o.user_id == user.user_id)
        .ok_or_else(|| AppError::not_found("Cart item"))?;
    if order.status != OrderStatus::Cart {
        return Err(AppError::state("Cannot modify a finalized order"));
    }

    let item = OrderItems::find_by_id(item_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Cart item"))?;
    Ok((order, item))
}

pub async fn set_item_qty(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    qty: i32,
) -> AppResult<CartMutation> {
    if qty < 0 {
        return Err(AppError::validation("qty must not be negative"));
    }

    let txn = state.orm.begin().await?;
    let (cart, item) = locked_line(&txn, user, item_id).await?;

    if qty == 0 {
        item.delete(&txn).await?;
        let (_, snapshot) = refresh_cart(&txn, cart).await?;
        txn.commit().await?;
        return Ok(CartMutation {
            cart: snapshot,
            qty_accepted: 0,
            conflict: None,
        });
    }

    let available = Products::find_by_id(item.product_id)
        .one(&txn)
        .await?
        .map_or(0, |p| p.stock);
    if available <= 0 {
        let (_, snapshot) = refresh_cart(&txn, cart).await?;
        txn.commit().await?;
        return Ok(CartMutation {
            cart: snapshot,
            qty_accepted: 0,
            conflict: Some(CartConflict::OutOfStock),
        });
    }

    let accepted = qty.min(available);
    let mut active: OrderItemActive = item.into();
    active.qty = Set(accepted);
    active.captured_at = Set(Utc::now().into());
    active.update(&txn).await?;

    let (_, snapshot) = refresh_cart(&txn, cart).await?;
    txn.commit().await?;

    Ok(CartMutation {
        cart: snapshot,
        qty_accepted: accepted,
        conflict: (accepted < qty).then_some(CartConflict::InsufficientStock),
    })
}

pub async fn remove_item(state: &AppState, user: &AuthUser, item_id: Uuid) -> AppResult<CartSnapshot> {
    let txn = state.orm.begin().await?;
    let (cart, item) = locked_line(&txn, user, item_id).await?;
    item.delete(&txn).await?;
    let (_, snapshot) = refresh_cart(&txn, cart).await?;
    txn.commit().await?;
    Ok(snapshot)
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<CartSnapshot> {
    let txn = state.orm.begin().await?;
    let cart = get_or_create_active_cart(&txn, user.user_id, &state.config.default_currency).await?;
    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(cart.id))
        .exec(&txn)
        .await?;
    let (_, snapshot) = refresh_cart(&txn, cart).await?;
    txn.commit().await?;
    Ok(snapshot)
}
