use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::{FulfillmentType, OrderStatus};

/// One row per cart and per order. A cart is an order in `cart` status whose
/// `cart_user_id` points at its owner; checkout clears the pointer.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(unique)]
    pub cart_user_id: Option<Uuid>,
    pub status: OrderStatus,
    pub version: i32,
    pub fulfillment_type: Option<FulfillmentType>,
    pub shipping_line1: Option<String>,
    pub shipping_line2: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_state: Option<String>,
    pub shipping_pincode: Option<String>,
    pub shipping_phone: Option<String>,
    pub pickup_point: Option<String>,
    pub pickup_slot_start: Option<DateTimeWithTimeZone>,
    pub pickup_slot_end: Option<DateTimeWithTimeZone>,
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
    pub currency: String,
    #[sea_orm(unique)]
    pub invoice_no: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub ready_at: Option<DateTimeWithTimeZone>,
    pub delivered_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_one = "super::payments::Entity")]
    Payments,
    #[sea_orm(has_many = "super::order_events::Entity")]
    OrderEvents,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::order_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
