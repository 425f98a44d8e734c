use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use sea_orm::ActiveValue::NotSet;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entity::order_events::{
        ActiveModel as OrderEventActive, Column as EventCol, Entity as OrderEvents,
        Model as OrderEventModel,
    },
    error::AppResult,
    models::OrderEvent,
};

/// Append one event to an order's audit trail. Pass the transaction the
/// transition runs in so the event commits or rolls back with it.
pub async fn record_event<C>(
    conn: &C,
    order_id: Uuid,
    event_type: &str,
    actor_id: Option<Uuid>,
    meta: Option<Value>,
) -> AppResult<()>
where
    C: ConnectionTrait,
{
    OrderEventActive {
        id: NotSet,
        order_id: Set(order_id),
        event_type: Set(event_type.to_string()),
        // Insert time, not transaction start, so the timeline follows lock order.
        at: Set(Utc::now().into()),
        actor_id: Set(actor_id),
        meta: Set(meta),
    }
    .insert(conn)
    .await?;

    tracing::debug!(%order_id, event_type, "order event recorded");
    Ok(())
}

/// Timeline as seen by `conn`, including events not yet committed by it.
pub async fn load_events<C>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderEvent>>
where
    C: ConnectionTrait,
{
    let events = OrderEvents::find()
        .filter(EventCol::OrderId.eq(order_id))
        .order_by_asc(EventCol::At)
        .order_by_asc(EventCol::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(event_from_entity)
        .collect();
    Ok(events)
}

fn event_from_entity(model: OrderEventModel) -> OrderEvent {
    OrderEvent {
        id: model.id,
        event_type: model.event_type,
        at: model.at.with_timezone(&Utc),
        actor_id: model.actor_id,
        meta: model.meta,
    }
}

#[derive(FromRow)]
struct OrderEventRow {
    id: i64,
    event_type: String,
    at: DateTime<Utc>,
    actor_id: Option<Uuid>,
    meta: Option<Value>,
}

/// Chronological timeline for one order, read from committed state.
pub async fn list_events(pool: &DbPool, order_id: Uuid) -> AppResult<Vec<OrderEvent>> {
    let rows = sqlx::query_as::<_, OrderEventRow>(
        r#"
        SELECT id, event_type, at, actor_id, meta
        FROM order_events
        WHERE order_id = $1
        ORDER BY at ASC, id ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| OrderEvent {
            id: row.id,
            event_type: row.event_type,
            at: row.at,
            actor_id: row.actor_id,
            meta: row.meta,
        })
        .collect())
}
