use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::{Expr, LockType},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::orders::OrderDetail,
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
    },
    error::{AppError, AppResult},
    event_log::{list_events, load_events, record_event},
    lifecycle::{self, Action, Actor, Step},
    middleware::auth::AuthUser,
    models::{
        DeliveryAddress, Fulfillment, FulfillmentType, Order, OrderEvent, OrderItem, OrderStatus,
        Payment, PaymentStatus, PickupSlot,
    },
    response::Meta,
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

pub const VERSION_CONFLICT: &str = "Order update conflict, please retry";

fn version_conflict() -> AppError {
    AppError::VersionConflict(VERSION_CONFLICT.into())
}

pub fn order_from_entity(model: OrderModel) -> Order {
    let fulfillment = fulfillment_from_entity(&model);
    Order {
        id: model.id,
        user_id: model.user_id,
        status: model.status,
        version: model.version,
        fulfillment,
        subtotal: model.subtotal,
        tax: model.tax,
        total: model.total,
        currency: model.currency,
        invoice_no: model.invoice_no,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        paid_at: model.paid_at.map(|t| t.with_timezone(&Utc)),
        ready_at: model.ready_at.map(|t| t.with_timezone(&Utc)),
        delivered_at: model.delivered_at.map(|t| t.with_timezone(&Utc)),
    }
}

/// `None` until a complete set of delivery or pickup columns is stored.
fn fulfillment_from_entity(model: &OrderModel) -> Option<Fulfillment> {
    match model.fulfillment_type? {
        FulfillmentType::Delivery => Some(Fulfillment::Delivery(DeliveryAddress {
            line1: model.shipping_line1.clone()?,
            line2: model.shipping_line2.clone(),
            city: model.shipping_city.clone()?,
            state: model.shipping_state.clone()?,
            pincode: model.shipping_pincode.clone()?,
            phone: model.shipping_phone.clone()?,
        })),
        FulfillmentType::Pickup => Some(Fulfillment::Pickup(PickupSlot {
            point: model.pickup_point.clone()?,
            slot_start: model.pickup_slot_start?.with_timezone(&Utc),
            slot_end: model.pickup_slot_end?.with_timezone(&Utc),
        })),
    }
}

/// Column changes that store `fulfillment` and null the other variant.
pub fn fulfillment_changes(fulfillment: Option<&Fulfillment>) -> OrderActive {
    let mut changes = OrderActive {
        fulfillment_type: Set(fulfillment.map(Fulfillment::kind)),
        shipping_line1: Set(None),
        shipping_line2: Set(None),
        shipping_city: Set(None),
        shipping_state: Set(None),
        shipping_pincode: Set(None),
        shipping_phone: Set(None),
        pickup_point: Set(None),
        pickup_slot_start: Set(None),
        pickup_slot_end: Set(None),
        ..Default::default()
    };
    match fulfillment {
        Some(Fulfillment::Delivery(address)) => {
            changes.shipping_line1 = Set(Some(address.line1.clone()));
            changes.shipping_line2 = Set(address.line2.clone());
            changes.shipping_city = Set(Some(address.city.clone()));
            changes.shipping_state = Set(Some(address.state.clone()));
            changes.shipping_pincode = Set(Some(address.pincode.clone()));
            changes.shipping_phone = Set(Some(address.phone.clone()));
        }
        Some(Fulfillment::Pickup(slot)) => {
            changes.pickup_point = Set(Some(slot.point.clone()));
            changes.pickup_slot_start = Set(Some(slot.slot_start.into()));
            changes.pickup_slot_end = Set(Some(slot.slot_end.into()));
        }
        None => {}
    }
    changes
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        variant_id: model.variant_id,
        qty: model.qty,
        unit_price: model.unit_price,
        line_total: i64::from(model.qty) * model.unit_price,
        currency: model.currency,
        captured_at: model.captured_at.with_timezone(&Utc),
    }
}

pub fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        status: model.status,
        gateway_order_id: model.gateway_order_id,
        gateway_payment_id: model.gateway_payment_id,
        amount: model.amount,
        currency: model.currency,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

/// `INV-YYYYMMDD-<order id prefix>-<random>`, e.g. `INV-20250101-1A2B3C4D-9F0E`.
pub fn generate_invoice_no(order_id: Uuid, at: DateTime<Utc>) -> String {
    let order_part = order_id.simple().to_string()[..8].to_ascii_uppercase();
    let random_part = Uuid::new_v4().simple().to_string()[..4].to_ascii_uppercase();
    format!("INV-{}-{}-{}", at.format("%Y%m%d"), order_part, random_part)
}

pub async fn lock_order<C>(conn: &C, order_id: Uuid) -> AppResult<OrderModel>
where
    C: ConnectionTrait,
{
    Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

/// Compare-and-swap on `version`: writes `changes` and bumps the version only
/// if the row still carries `expected_version`.
pub async fn increment_order_version<C>(
    conn: &C,
    order_id: Uuid,
    expected_version: i32,
    mut changes: OrderActive,
) -> AppResult<OrderModel>
where
    C: ConnectionTrait,
{
    changes.updated_at = Set(Utc::now().into());
    let result = Orders::update_many()
        .set(changes)
        .col_expr(OrderCol::Version, Expr::col(OrderCol::Version).add(1))
        .filter(OrderCol::Id.eq(order_id))
        .filter(OrderCol::Version.eq(expected_version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        tracing::warn!(%order_id, expected_version, "order version conflict");
        return Err(version_conflict());
    }

    Orders::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

/// The compare key for a write: the caller's version when given, which must
/// match the locked row, otherwise the row's own.
pub fn expected_version(order: &OrderModel, supplied: Option<i32>) -> AppResult<i32> {
    match supplied {
        Some(version) if version != order.version => {
            tracing::warn!(order_id = %order.id, supplied = version, current = order.version, "stale order version");
            Err(version_conflict())
        }
        Some(version) => Ok(version),
        None => Ok(order.version),
    }
}

pub async fn load_order_detail<C>(conn: &C, order: OrderModel) -> AppResult<OrderDetail>
where
    C: ConnectionTrait,
{
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .order_by_asc(OrderItemCol::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .one(conn)
        .await?
        .map(payment_from_entity);

    let events = load_events(conn, order.id).await?;

    Ok(OrderDetail {
        order: order_from_entity(order),
        items,
        payment,
        events,
    })
}

/// Orders visible to `user`; carts are never listed.
async fn find_owned(state: &AppState, user: &AuthUser, order_id: Uuid) -> AppResult<OrderModel> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .filter(|o| o.status != OrderStatus::Cart)
        .ok_or_else(|| AppError::not_found("Order"))?;
    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    Ok(order)
}

pub async fn get_order(state: &AppState, user: &AuthUser, order_id: Uuid) -> AppResult<OrderDetail> {
    let order = find_owned(state, user, order_id).await?;
    load_order_detail(&state.orm, order).await
}

pub async fn get_order_events(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<Vec<OrderEvent>> {
    let order = find_owned(state, user, order_id).await?;
    list_events(&state.pool, order.id).await
}

/// Paginated listing shared by the customer and admin views.
pub async fn query_orders(
    state: &AppState,
    owner: Option<Uuid>,
    query: OrderListQuery,
) -> AppResult<(Vec<Order>, Meta)> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::Status.ne(OrderStatus::Cart));
    if let Some(user_id) = owner {
        condition = condition.add(OrderCol::UserId.eq(user_id));
    }
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = i64::try_from(finder.clone().count(&state.orm).await?)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let limit_rows = u64::try_from(limit).map_err(|_| AppError::validation("per_page out of range"))?;
    let offset_rows = u64::try_from(offset).map_err(|_| AppError::validation("page out of range"))?;
    let orders = finder
        .limit(limit_rows)
        .offset(offset_rows)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok((orders, Meta::new(page, limit, total)))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<(Vec<Order>, Meta)> {
    query_orders(state, Some(user.user_id), query).await
}

/// Run one lifecycle action under the order's row lock and return the
/// resulting snapshot.
pub async fn apply_transition(
    state: &AppState,
    order_id: Uuid,
    action: Action,
    actor: Actor,
    supplied_version: Option<i32>,
) -> AppResult<OrderDetail> {
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, order_id).await?;
    if let Actor::Owner(user_id) = actor {
        if order.user_id != user_id {
            return Err(AppError::Forbidden);
        }
    }

    if lifecycle::authorize(order.status, action, &actor)? == Step::AlreadyApplied {
        tracing::debug!(%order_id, ?action, "transition already applied");
        let detail = load_order_detail(&txn, order).await?;
        txn.commit().await?;
        return Ok(detail);
    }

    let expected = expected_version(&order, supplied_version)?;
    let now = Utc::now();
    let mut changes = OrderActive {
        status: Set(action.to_status()),
        ..Default::default()
    };
    match action {
        Action::MarkReady => changes.ready_at = Set(Some(now.into())),
        Action::MarkDelivered => changes.delivered_at = Set(Some(now.into())),
        Action::Cancel => cancel_open_payment(&txn, order.id).await?,
        Action::Checkout | Action::MarkPaid => {}
    }

    let from = order.status;
    let updated = increment_order_version(&txn, order.id, expected, changes).await?;
    record_event(
        &txn,
        updated.id,
        action.event_type(&actor),
        actor.user_id(),
        Some(json!({ "from": from, "to": updated.status, "version": updated.version })),
    )
    .await?;

    let detail = load_order_detail(&txn, updated).await?;
    txn.commit().await?;

    tracing::info!(
        %order_id,
        version = detail.order.version,
        status = %detail.order.status,
        "order transitioned"
    );
    Ok(detail)
}

async fn cancel_open_payment<C>(conn: &C, order_id: Uuid) -> AppResult<()>
where
    C: ConnectionTrait,
{
    Payments::update_many()
        .set(PaymentActive {
            status: Set(PaymentStatus::Canceled),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        })
        .filter(PaymentCol::OrderId.eq(order_id))
        .filter(PaymentCol::Status.eq(PaymentStatus::Created))
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    expected_version: Option<i32>,
) -> AppResult<OrderDetail> {
    apply_transition(state, order_id, Action::Cancel, Actor::Owner(user.user_id), expected_version).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cart_model() -> OrderModel {
        let now = Utc::now().into();
        OrderModel {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            cart_user_id: None,
            status: OrderStatus::Pending,
            version: 3,
            fulfillment_type: None,
            shipping_line1: None,
            shipping_line2: None,
            shipping_city: None,
            shipping_state: None,
            shipping_pincode: None,
            shipping_phone: None,
            pickup_point: None,
            pickup_slot_start: None,
            pickup_slot_end: None,
            subtotal: 1000,
            tax: 0,
            total: 1000,
            currency: "INR".into(),
            invoice_no: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            ready_at: None,
            delivered_at: None,
        }
    }

    #[test]
    fn invoice_number_has_date_order_prefix_and_suffix() {
        let order_id = Uuid::parse_str("1a2b3c4d-0000-4000-8000-000000000000").unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        let invoice = generate_invoice_no(order_id, at);
        let parts: Vec<&str> = invoice.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "INV");
        assert_eq!(parts[1], "20250309");
        assert_eq!(parts[2], "1A2B3C4D");
        assert_eq!(parts[3].len(), 4);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn fulfillment_requires_complete_columns() {
        let mut model = cart_model();
        assert_eq!(fulfillment_from_entity(&model), None);

        model.fulfillment_type = Some(FulfillmentType::Delivery);
        model.shipping_line1 = Some("12 Baker Street".into());
        assert_eq!(fulfillment_from_entity(&model), None);

        model.shipping_city = Some("Pune".into());
        model.shipping_state = Some("MH".into());
        model.shipping_pincode = Some("411001".into());
        model.shipping_phone = Some("9876543210".into());
        assert!(matches!(
            fulfillment_from_entity(&model),
            Some(Fulfillment::Delivery(ref a)) if a.city == "Pune"
        ));
    }

    #[test]
    fn fulfillment_changes_null_the_other_variant() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let pickup = Fulfillment::Pickup(PickupSlot {
            point: "Main gate".into(),
            slot_start: start,
            slot_end: start + chrono::Duration::hours(1),
        });
        let changes = fulfillment_changes(Some(&pickup));
        assert_eq!(changes.fulfillment_type, Set(Some(FulfillmentType::Pickup)));
        assert_eq!(changes.pickup_point, Set(Some("Main gate".to_string())));
        assert_eq!(changes.shipping_line1, Set(None));
        assert_eq!(changes.shipping_phone, Set(None));
    }

    #[test]
    fn supplied_version_must_match_row() {
        let order = cart_model();
        assert_eq!(expected_version(&order, None).unwrap(), 3);
        assert_eq!(expected_version(&order, Some(3)).unwrap(), 3);
        let err = expected_version(&order, Some(2)).unwrap_err();
        assert!(matches!(err, AppError::VersionConflict(_)));
        assert_eq!(err.to_string(), VERSION_CONFLICT);
    }
}
