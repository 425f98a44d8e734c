#![allow(dead_code)]

use axum_checkout_engine::{
    config::AppConfig,
    db::{DbPool, OrmConn, create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::AddCartItemRequest,
        orders::{DeliveryDetailsRequest, OrderDetail, PickupDetailsRequest},
        payments::PaymentIntent,
    },
    entity::products::{ActiveModel as ProductActive, Entity as Products, Model as ProductModel},
    middleware::auth::{ADMIN_ROLE, AuthUser},
    services::{
        cart_service, checkout_service,
        payment_service::{self, FinalizePayment, PaymentSource},
    },
    state::AppState,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, Set};
use std::str::FromStr;
use tokio::sync::OnceCell;
use uuid::Uuid;

static MIGRATED: OnceCell<()> = OnceCell::const_new();

// Arbitrary key shared by every test binary so only one migrates at a time.
const MIGRATION_LOCK: i64 = 7_263_118;

fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

async fn migrate_once(pool: &DbPool, orm: &OrmConn) -> anyhow::Result<()> {
    let mut conn = pool.acquire().await?;
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK)
        .execute(&mut *conn)
        .await?;
    let migrated = run_migrations(orm).await;
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK)
        .execute(&mut *conn)
        .await?;
    migrated
}

/// `None` when no database is configured; callers return early.
pub async fn setup() -> anyhow::Result<Option<AppState>> {
    setup_with(|_| {}).await
}

pub async fn setup_with(configure: impl FnOnce(&mut AppConfig)) -> anyhow::Result<Option<AppState>> {
    let Some(url) = database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(None);
    };

    let pool = create_pool(&url).await?;
    let orm = create_orm_conn(&url).await?;

    let (pool_ref, orm_ref) = (&pool, &orm);
    MIGRATED
        .get_or_try_init(move || migrate_once(pool_ref, orm_ref))
        .await?;

    let mut config = AppConfig::for_database(url);
    configure(&mut config);
    Ok(Some(AppState::new(pool, orm, config)?))
}

pub fn customer() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: ADMIN_ROLE.into(),
    }
}

pub async fn create_product(
    state: &AppState,
    price: &str,
    stock: i32,
    currency: &str,
) -> anyhow::Result<ProductModel> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Test product {}", Uuid::new_v4())),
        price: Set(Decimal::from_str(price)?),
        currency: Set(currency.into()),
        stock: Set(stock),
        active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {product_id} missing"))?;
    Ok(product.stock)
}

pub async fn add(state: &AppState, user: &AuthUser, product_id: Uuid, qty: i32) -> anyhow::Result<()> {
    cart_service::add_item(
        state,
        user,
        AddCartItemRequest {
            product_id,
            variant_id: None,
            qty,
        },
    )
    .await?;
    Ok(())
}

pub fn delivery(order_id: Uuid, version: i32) -> DeliveryDetailsRequest {
    DeliveryDetailsRequest {
        order_id,
        version,
        line1: "42 MG Road".into(),
        line2: None,
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        pincode: "560001".into(),
        phone: "+919812345678".into(),
    }
}

pub fn pickup(order_id: Uuid, version: i32) -> PickupDetailsRequest {
    let start = Utc::now() + Duration::days(1);
    PickupDetailsRequest {
        order_id,
        version,
        point: "Store counter".into(),
        slot_start: start,
        slot_end: start + Duration::hours(1),
    }
}

/// Cart with `qty` of `product`, checked out, delivery address set (version 2).
pub async fn pending_order(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    qty: i32,
) -> anyhow::Result<OrderDetail> {
    add(state, user, product_id, qty).await?;
    let checkout = checkout_service::start_checkout(state, user).await?;
    let order = checkout_service::set_delivery_details(
        state,
        user,
        delivery(checkout.order.order.id, checkout.order.order.version),
    )
    .await?;
    Ok(order)
}

pub async fn intent_for(state: &AppState, user: &AuthUser, order_id: Uuid) -> anyhow::Result<PaymentIntent> {
    Ok(payment_service::create_payment_intent(state, user, order_id).await?)
}

pub fn confirmation(gateway_order_id: &str, gateway_payment_id: &str) -> FinalizePayment {
    let body = serde_json::json!({
        "razorpay_order_id": gateway_order_id,
        "razorpay_payment_id": gateway_payment_id,
    });
    FinalizePayment {
        gateway_order_id: gateway_order_id.into(),
        gateway_payment_id: gateway_payment_id.into(),
        signature: None,
        raw_body: body.to_string().into_bytes(),
        skip_signature_check: false,
        source: PaymentSource::Manual,
    }
}
