use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait,
    QueryFilter, QuerySelect, Statement, TransactionTrait, sea_query::LockType,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::{orders::OrderDetail, payments::PaymentIntent},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Model as OrderModel},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments, Model as PaymentModel},
    },
    error::{AppError, AppResult, summarize_shortages},
    event_log::record_event,
    gateway::verify_signature,
    lifecycle::{self, Action, Actor, Step},
    middleware::auth::AuthUser,
    models::{OrderStatus, PaymentStatus},
    services::{
        inventory::{assert_sufficient_stock, decrement_all, demand},
        order_service::{
            generate_invoice_no, increment_order_version, load_order_detail, lock_order,
            order_from_entity,
        },
    },
    state::AppState,
};

/// Where a payment confirmation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    /// Signed gateway callback.
    Webhook,
    /// Accepted without a signature (no webhook secret configured).
    Manual,
}

#[derive(Debug, Clone)]
pub struct FinalizePayment {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: Option<String>,
    pub raw_body: Vec<u8>,
    pub skip_signature_check: bool,
    pub source: PaymentSource,
}

async fn order_demand<C>(conn: &C, order_id: Uuid) -> AppResult<std::collections::BTreeMap<Uuid, i32>>
where
    C: ConnectionTrait,
{
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(conn)
        .await?;
    Ok(demand(items.into_iter().map(|item| (item.product_id, item.qty))))
}

fn is_settled(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::Paid | OrderStatus::Ready | OrderStatus::Delivered
    )
}

fn intent_from_payment(state: &AppState, payment: PaymentModel) -> PaymentIntent {
    PaymentIntent {
        order_id: payment.order_id,
        gateway_order_id: payment.gateway_order_id,
        amount: payment.amount,
        currency: payment.currency,
        key_id: state.gateway.key_id().map(str::to_string),
        status: payment.status,
        test_mode: state.gateway.test_mode(),
    }
}

async fn find_payment<C>(conn: &C, order_id: Uuid) -> AppResult<Option<PaymentModel>>
where
    C: ConnectionTrait,
{
    Ok(Payments::find()
        .filter(PaymentCol::OrderId.eq(order_id))
        .one(conn)
        .await?)
}

/// Everything that must hold before money is requested for `order`.
async fn ensure_payable<C>(conn: &C, order: &OrderModel) -> AppResult<()>
where
    C: ConnectionTrait,
{
    if order.status != OrderStatus::Pending {
        return Err(AppError::state("Order is not pending payment"));
    }
    if order_from_entity(order.clone()).fulfillment.is_none() {
        return Err(AppError::validation(
            "Delivery or pickup details are required before payment",
        ));
    }
    assert_sufficient_stock(conn, &order_demand(conn, order.id).await?).await
}

enum IntentPlan {
    Ready(PaymentModel),
    Create { amount: i64, currency: String },
}

pub async fn create_payment_intent(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<PaymentIntent> {
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, order_id).await?;
    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let plan = if is_settled(order.status) {
        let payment = find_payment(&txn, order.id)
            .await?
            .ok_or_else(|| AppError::state("Paid order has no payment record"))?;
        IntentPlan::Ready(payment)
    } else {
        ensure_payable(&txn, &order).await?;
        match find_payment(&txn, order.id).await? {
            Some(payment) if payment.status == PaymentStatus::Created => IntentPlan::Ready(payment),
            Some(_) => return Err(AppError::state("Payment for this order is closed")),
            None => IntentPlan::Create {
                amount: order.total,
                currency: order.currency.clone(),
            },
        }
    };
    txn.commit().await?;

    let (amount, currency) = match plan {
        IntentPlan::Ready(payment) => {
            tracing::debug!(%order_id, gateway_order_id = %payment.gateway_order_id, "reusing payment intent");
            return Ok(intent_from_payment(state, payment));
        }
        IntentPlan::Create { amount, currency } => (amount, currency),
    };

    // No transaction is held across the gateway round trip.
    let receipt = format!("order_{}", order_id.simple());
    let gateway_order_id = state.gateway.create_order(amount, &currency, &receipt).await?;

    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, order_id).await?;
    if let Err(err) = ensure_payable(&txn, &order).await {
        tracing::warn!(%order_id, %gateway_order_id, "order changed during gateway call; gateway order orphaned");
        return Err(err);
    }
    if order.total != amount || order.currency != currency {
        tracing::warn!(%order_id, %gateway_order_id, "order total changed during gateway call; gateway order orphaned");
        return Err(AppError::state("Order total changed, please retry"));
    }

    let inserted = txn
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO payments (id, order_id, status, gateway_order_id, amount, currency)
            VALUES ($1, $2, 'created', $3, $4, $5)
            ON CONFLICT (order_id) DO NOTHING
            "#,
            [
                Uuid::new_v4().into(),
                order_id.into(),
                gateway_order_id.clone().into(),
                amount.into(),
                currency.clone().into(),
            ],
        ))
        .await?
        .rows_affected();

    if inserted == 0 {
        tracing::warn!(%order_id, %gateway_order_id, "concurrent intent won; gateway order orphaned");
    } else {
        record_event(
            &txn,
            order_id,
            "payment_intent_created",
            Some(user.user_id),
            Some(json!({ "gateway_order_id": gateway_order_id, "amount": amount })),
        )
        .await?;
        tracing::info!(%order_id, %gateway_order_id, amount, "payment intent created");
    }

    let payment = find_payment(&txn, order_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("payment missing for order {order_id}")))?;
    txn.commit().await?;
    Ok(intent_from_payment(state, payment))
}

fn check_signature(config: &AppConfig, input: &FinalizePayment) -> AppResult<()> {
    let Some(secret) = config.webhook_secret.as_deref() else {
        return Ok(());
    };
    if input.skip_signature_check && !config.is_production() {
        tracing::warn!(gateway_order_id = %input.gateway_order_id, "payment signature check skipped");
        return Ok(());
    }
    let signature = input
        .signature
        .as_deref()
        .ok_or_else(|| AppError::SignatureInvalid("Missing payment signature".into()))?;
    verify_signature(secret, &input.raw_body, signature)
}

/// Capture a confirmed payment: decrement stock, mark the payment and order
/// paid, assign the invoice number. Repeated confirmations return the order
/// unchanged.
pub async fn finalize_payment(state: &AppState, input: FinalizePayment) -> AppResult<OrderDetail> {
    check_signature(&state.config, &input)?;

    let txn = state.orm.begin().await?;
    let order_id = Payments::find()
        .filter(PaymentCol::GatewayOrderId.eq(input.gateway_order_id.as_str()))
        .one(&txn)
        .await?
        .map(|payment| payment.order_id)
        .ok_or_else(|| AppError::not_found("Payment"))?;

    // Lock the order before the payment, as cancel does.
    let order = lock_order(&txn, order_id).await?;
    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Payment"))?;

    match payment.status {
        PaymentStatus::Paid => {
            tracing::info!(%order_id, gateway_order_id = %payment.gateway_order_id, "duplicate payment confirmation");
            let detail = load_order_detail(&txn, order).await?;
            txn.commit().await?;
            return Ok(detail);
        }
        PaymentStatus::Canceled => {
            tracing::warn!(%order_id, gateway_order_id = %payment.gateway_order_id, "confirmation for canceled payment");
            return Err(AppError::state("Payment was canceled"));
        }
        PaymentStatus::Created => {}
    }

    if lifecycle::authorize(order.status, Action::MarkPaid, &Actor::System)? == Step::AlreadyApplied {
        let detail = load_order_detail(&txn, order).await?;
        txn.commit().await?;
        return Ok(detail);
    }

    let wanted = order_demand(&txn, order.id).await?;
    if let Err(err) = decrement_all(&txn, &wanted).await {
        if let AppError::StockConflict(shortages) = &err {
            tracing::error!(
                order_id = %order.id,
                gateway_payment_id = %input.gateway_payment_id,
                conflicts = %summarize_shortages(shortages),
                "stock conflict while capturing payment"
            );
        }
        return Err(err);
    }

    let now = Utc::now();
    let mut paid: PaymentActive = payment.into();
    paid.status = Set(PaymentStatus::Paid);
    paid.gateway_payment_id = Set(Some(input.gateway_payment_id.clone()));
    paid.updated_at = Set(now.into());
    paid.update(&txn).await?;

    let invoice_no = order
        .invoice_no
        .clone()
        .unwrap_or_else(|| generate_invoice_no(order.id, now));
    let changes = OrderActive {
        status: Set(Action::MarkPaid.to_status()),
        paid_at: Set(Some(now.into())),
        invoice_no: Set(Some(invoice_no.clone())),
        ..Default::default()
    };
    let updated = increment_order_version(&txn, order.id, order.version, changes).await?;

    record_event(
        &txn,
        updated.id,
        "payment_succeeded",
        None,
        Some(json!({
            "gateway_order_id": input.gateway_order_id,
            "gateway_payment_id": input.gateway_payment_id,
            "source": input.source,
        })),
    )
    .await?;
    record_event(
        &txn,
        updated.id,
        Action::MarkPaid.event_type(&Actor::System),
        None,
        Some(json!({ "invoice_no": invoice_no, "version": updated.version })),
    )
    .await?;

    let detail = load_order_detail(&txn, updated).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %detail.order.id,
        version = detail.order.version,
        invoice_no = %invoice_no,
        "order paid"
    );
    Ok(detail)
}
