mod common;

use axum_checkout_engine::{
    error::AppError,
    models::{Fulfillment, FulfillmentType, OrderStatus},
    services::{checkout_service, order_service},
};

#[tokio::test]
async fn checkout_turns_cart_into_pending_order() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::customer();
    let product = common::create_product(&state, "120.50", 5, "INR").await?;
    common::add(&state, &user, product.id, 2).await?;

    let result = checkout_service::start_checkout(&state, &user).await?;
    let order = &result.order.order;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.version, 1);
    assert_eq!(order.subtotal, 24100);
    assert_eq!(order.total, order.subtotal + order.tax);
    assert_eq!(order.fulfillment, None);
    assert_eq!(result.order.items.len(), 1);
    assert_eq!(result.order.items[0].qty, 2);
    assert_eq!(result.order.events.len(), 1);
    assert_eq!(result.order.events[0].event_type, "checkout_started");

    assert_ne!(result.cart.order_id, order.id);
    assert!(result.cart.items.is_empty());

    // Validated, not reserved.
    assert_eq!(common::stock_of(&state, product.id).await?, 5);
    Ok(())
}

#[tokio::test]
async fn empty_cart_cannot_check_out() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::customer();
    let result = checkout_service::start_checkout(&state, &user).await;
    assert!(matches!(result, Err(AppError::StateConflict(_))));
    Ok(())
}

#[tokio::test]
async fn checkout_reports_every_shortage() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::customer();
    let a = common::create_product(&state, "10", 5, "INR").await?;
    let b = common::create_product(&state, "10", 5, "INR").await?;
    common::add(&state, &user, a.id, 4).await?;
    common::add(&state, &user, b.id, 3).await?;

    // Someone else bought most of the stock in the meantime.
    sea_orm::ConnectionTrait::execute_unprepared(
        &state.orm,
        &format!("UPDATE products SET stock = 1 WHERE id IN ('{}', '{}')", a.id, b.id),
    )
    .await?;

    match checkout_service::start_checkout(&state, &user).await {
        Err(AppError::StockConflict(shortages)) => {
            assert_eq!(shortages.len(), 2);
            assert!(shortages.iter().all(|s| s.available == 1));
            let a_short = shortages.iter().find(|s| s.product_id == a.id).expect("a");
            assert_eq!(a_short.requested, 4);
        }
        other => panic!("expected stock conflict, got {other:?}"),
    }

    // The cart is untouched and can still be edited.
    let cart = axum_checkout_engine::services::cart_service::get_cart(&state, &user).await?;
    assert_eq!(cart.items.len(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_create_one_order() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::customer();
    let product = common::create_product(&state, "10", 5, "INR").await?;
    common::add(&state, &user, product.id, 1).await?;

    let (first, second) = tokio::join!(
        checkout_service::start_checkout(&state, &user),
        checkout_service::start_checkout(&state, &user),
    );
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(AppError::StateConflict(_)))));
    Ok(())
}

#[tokio::test]
async fn delivery_and_pickup_are_exclusive_and_versioned() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::customer();
    let product = common::create_product(&state, "10", 5, "INR").await?;
    common::add(&state, &user, product.id, 1).await?;
    let checkout = checkout_service::start_checkout(&state, &user).await?;
    let order_id = checkout.order.order.id;

    let delivered = checkout_service::set_delivery_details(&state, &user, common::delivery(order_id, 1)).await?;
    assert_eq!(delivered.order.version, 2);
    assert!(matches!(delivered.order.fulfillment, Some(Fulfillment::Delivery(ref a)) if a.pincode == "560001"));

    let picked = checkout_service::set_pickup_details(&state, &user, common::pickup(order_id, 2)).await?;
    assert_eq!(picked.order.version, 3);
    let fulfillment = picked.order.fulfillment.clone().expect("pickup");
    assert_eq!(fulfillment.kind(), FulfillmentType::Pickup);

    // Replaying the first write with its now-stale version changes nothing.
    let stale = checkout_service::set_delivery_details(&state, &user, common::delivery(order_id, 1)).await;
    assert!(matches!(stale, Err(AppError::VersionConflict(_))));
    let current = order_service::get_order(&state, &user, order_id).await?;
    assert_eq!(current.order.version, 3);
    assert_eq!(current.order.fulfillment.map(|f| f.kind()), Some(FulfillmentType::Pickup));

    let types: Vec<&str> = current.events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        types,
        ["checkout_started", "fulfillment_delivery_set", "fulfillment_pickup_set"]
    );
    Ok(())
}

#[tokio::test]
async fn fulfillment_rules() -> anyhow::Result<()> {
    let Some(state) = common::setup().await? else {
        return Ok(());
    };
    let user = common::customer();
    let product = common::create_product(&state, "10", 5, "INR").await?;
    common::add(&state, &user, product.id, 1).await?;
    let checkout = checkout_service::start_checkout(&state, &user).await?;
    let order_id = checkout.order.order.id;

    let stranger = common::customer();
    let foreign = checkout_service::set_delivery_details(&state, &stranger, common::delivery(order_id, 1)).await;
    assert!(matches!(foreign, Err(AppError::Forbidden)));

    let mut bad = common::delivery(order_id, 1);
    bad.pincode = "ABC123".into();
    let invalid = checkout_service::set_delivery_details(&state, &user, bad).await;
    assert!(matches!(invalid, Err(AppError::Validation(_))));

    let canceled = order_service::cancel_order(&state, &user, order_id, Some(1)).await?;
    assert_eq!(canceled.order.status, OrderStatus::Canceled);
    let late = checkout_service::set_pickup_details(&state, &user, common::pickup(order_id, 2)).await;
    assert!(matches!(late, Err(AppError::StateConflict(_))));
    Ok(())
}
