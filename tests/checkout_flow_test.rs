//! End-to-end checkout and settlement scenarios against a fresh SQLite
//! database and a fake payment gateway.

mod common;

use std::sync::atomic::Ordering;

use common::{sign, TestApp};

use aurum_api::{
    entities::OrderStatus,
    errors::ServiceError,
    services::catalog::{ProductRef, UpdateProductRequest},
    services::orders::{CreateOrderRequest, OrderItemRequest},
    services::settlement::VerifyPaymentRequest,
};

fn order_request(items: Vec<OrderItemRequest>) -> CreateOrderRequest {
    CreateOrderRequest {
        items,
        email: "shopper@example.com".to_string(),
        phone: "+919999999999".to_string(),
        shipping_address: "12 Marine Drive, Mumbai 400001".to_string(),
    }
}

fn item(product: &str, quantity: i32) -> OrderItemRequest {
    OrderItemRequest {
        product: product.to_string(),
        quantity,
    }
}

#[tokio::test]
async fn order_total_is_priced_server_side() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;
    app.seed_product("Pearl Necklace", "pearl-necklace", 120_000, 5).await;

    let checkout = app
        .services
        .orders
        .create_order(
            user.id,
            order_request(vec![
                item(&ring.id.to_string(), 2),
                item("pearl-necklace", 1),
            ]),
        )
        .await
        .expect("checkout succeeds");

    assert_eq!(checkout.amount, 2 * 250_000 + 120_000);
    assert_eq!(checkout.currency, "INR");
    assert_eq!(checkout.key_id, "rzp_test_key");
    assert!(checkout.gateway_intent_id.starts_with("order_test_"));

    let details = app
        .services
        .orders
        .get_order(checkout.order_id, user.id, false)
        .await
        .expect("order readable");
    assert_eq!(details.order.status, OrderStatus::Placed);
    assert_eq!(details.order.total, checkout.amount);
    assert_eq!(details.items.len(), 2);
}

#[tokio::test]
async fn line_prices_are_frozen_at_checkout() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;

    let checkout = app
        .services
        .orders
        .create_order(user.id, order_request(vec![item("aurora-ring", 1)]))
        .await
        .unwrap();

    // Catalog price change after placement must not touch the order.
    app.services
        .catalog
        .update_product(
            ring.id,
            UpdateProductRequest {
                name: None,
                description: None,
                price: Some(999_999),
                compare_at_price: None,
                inventory: None,
                collection_id: None,
                tags: None,
            },
        )
        .await
        .unwrap();

    let details = app
        .services
        .orders
        .get_order(checkout.order_id, user.id, false)
        .await
        .unwrap();
    assert_eq!(details.order.total, 250_000);
    assert_eq!(details.items[0].unit_price, 250_000);
}

#[tokio::test]
async fn empty_order_is_rejected() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;

    let err = app
        .services
        .orders
        .create_order(user.id, order_request(vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn unknown_product_fails_the_whole_batch() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;

    let err = app
        .services
        .orders
        .create_order(
            user.id,
            order_request(vec![item("aurora-ring", 1), item("no-such-slug", 1)]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidProduct(_)));

    // Nothing was persisted.
    let orders = app.services.orders.list_orders_for_user(user.id).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn insufficient_stock_names_the_product() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    app.seed_product("Aurora Ring", "aurora-ring", 250_000, 2).await;

    let err = app
        .services
        .orders
        .create_order(user.id, order_request(vec![item("aurora-ring", 3)]))
        .await
        .unwrap_err();
    match err {
        ServiceError::InsufficientStock { product, available } => {
            assert_eq!(product, "Aurora Ring");
            assert_eq!(available, 2);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
}

#[tokio::test]
async fn totals_below_the_minimum_are_rejected() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    app.seed_product("Tiny Charm", "tiny-charm", 40, 10).await;

    let err = app
        .services
        .orders
        .create_order(user.id, order_request(vec![item("tiny-charm", 2)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidAmount(_)));
}

#[tokio::test]
async fn totals_that_overflow_are_rejected() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    app.seed_product("Solid Gold Vault", "gold-vault", i64::MAX, 5).await;

    let err = app
        .services
        .orders
        .create_order(user.id, order_request(vec![item("gold-vault", 2)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidAmount(_)));

    let orders = app.services.orders.list_orders_for_user(user.id).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn gateway_failure_leaves_a_placed_order_behind() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;

    app.gateway.fail_create.store(true, Ordering::SeqCst);
    let err = app
        .services
        .orders
        .create_order(user.id, order_request(vec![item("aurora-ring", 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::GatewayUnavailable(_)));

    // The order was committed before the gateway call; it stays PLACED with
    // no intent and can never settle.
    let orders = app.services.orders.list_orders_for_user(user.id).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Placed);
    assert!(orders[0].gateway_intent_id.is_none());
}

#[tokio::test]
async fn settlement_decrements_stock_and_records_payment_refs() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;

    let checkout = app
        .services
        .orders
        .create_order(user.id, order_request(vec![item("aurora-ring", 3)]))
        .await
        .unwrap();

    let signature = sign(&checkout.gateway_intent_id, "pay_001");
    let settled = app
        .services
        .settlement
        .verify_and_settle(VerifyPaymentRequest {
            gateway_intent_id: checkout.gateway_intent_id.clone(),
            gateway_payment_id: "pay_001".to_string(),
            gateway_signature: signature,
        })
        .await
        .expect("settlement succeeds");

    assert_eq!(settled.order_id, checkout.order_id);
    assert_eq!(settled.status, OrderStatus::Paid);

    let details = app
        .services
        .orders
        .get_order(checkout.order_id, user.id, false)
        .await
        .unwrap();
    assert_eq!(details.order.status, OrderStatus::Paid);
    assert_eq!(
        details.order.gateway_intent_id.as_deref(),
        Some(checkout.gateway_intent_id.as_str())
    );
    assert_eq!(details.order.gateway_payment_id.as_deref(), Some("pay_001"));
    assert!(details.order.gateway_signature.is_some());

    let stocked = app
        .services
        .catalog
        .resolve(&ProductRef::Id(ring.id))
        .await
        .unwrap();
    assert_eq!(stocked.inventory, 7);
}

#[tokio::test]
async fn settlement_is_idempotent() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;

    let checkout = app
        .services
        .orders
        .create_order(user.id, order_request(vec![item("aurora-ring", 2)]))
        .await
        .unwrap();

    let req = || VerifyPaymentRequest {
        gateway_intent_id: checkout.gateway_intent_id.clone(),
        gateway_payment_id: "pay_001".to_string(),
        gateway_signature: sign(&checkout.gateway_intent_id, "pay_001"),
    };

    app.services.settlement.verify_and_settle(req()).await.unwrap();
    let second = app
        .services
        .settlement
        .verify_and_settle(req())
        .await
        .expect("retry is a no-op success");
    assert_eq!(second.status, OrderStatus::Paid);

    // Stock decremented exactly once.
    let stocked = app
        .services
        .catalog
        .resolve(&ProductRef::Id(ring.id))
        .await
        .unwrap();
    assert_eq!(stocked.inventory, 8);
}

#[tokio::test]
async fn forged_signature_is_rejected_and_changes_nothing() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;

    let checkout = app
        .services
        .orders
        .create_order(user.id, order_request(vec![item("aurora-ring", 1)]))
        .await
        .unwrap();

    let err = app
        .services
        .settlement
        .verify_and_settle(VerifyPaymentRequest {
            gateway_intent_id: checkout.gateway_intent_id.clone(),
            gateway_payment_id: "pay_001".to_string(),
            gateway_signature: "deadbeef".repeat(8),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SignatureMismatch));

    let details = app
        .services
        .orders
        .get_order(checkout.order_id, user.id, false)
        .await
        .unwrap();
    assert_eq!(details.order.status, OrderStatus::Placed);

    let stocked = app
        .services
        .catalog
        .resolve(&ProductRef::Id(ring.id))
        .await
        .unwrap();
    assert_eq!(stocked.inventory, 10);
}

#[tokio::test]
async fn settlement_with_missing_fields_is_rejected() {
    let app = TestApp::new().await;

    let err = app
        .services
        .settlement
        .verify_and_settle(VerifyPaymentRequest {
            gateway_intent_id: "order_test_0".to_string(),
            gateway_payment_id: "".to_string(),
            gateway_signature: "abc".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn out_of_stock_settlement_touches_nothing() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;
    let necklace = app
        .seed_product("Pearl Necklace", "pearl-necklace", 120_000, 1)
        .await;

    let checkout = app
        .services
        .orders
        .create_order(
            user.id,
            order_request(vec![item("aurora-ring", 2), item("pearl-necklace", 1)]),
        )
        .await
        .unwrap();

    // Someone else takes the last necklace between placement and settlement.
    app.services
        .catalog
        .update_product(
            necklace.id,
            UpdateProductRequest {
                name: None,
                description: None,
                price: None,
                compare_at_price: None,
                inventory: Some(0),
                collection_id: None,
                tags: None,
            },
        )
        .await
        .unwrap();

    let err = app
        .services
        .settlement
        .verify_and_settle(VerifyPaymentRequest {
            gateway_intent_id: checkout.gateway_intent_id.clone(),
            gateway_payment_id: "pay_001".to_string(),
            gateway_signature: sign(&checkout.gateway_intent_id, "pay_001"),
        })
        .await
        .unwrap_err();
    match err {
        ServiceError::OutOfStock { product } => assert_eq!(product, "Pearl Necklace"),
        other => panic!("expected OutOfStock, got {other:?}"),
    }

    // All-or-nothing: the ring's stock is untouched and the order is unpaid.
    let stocked = app
        .services
        .catalog
        .resolve(&ProductRef::Id(ring.id))
        .await
        .unwrap();
    assert_eq!(stocked.inventory, 10);

    let details = app
        .services
        .orders
        .get_order(checkout.order_id, user.id, false)
        .await
        .unwrap();
    assert_eq!(details.order.status, OrderStatus::Placed);
}

#[tokio::test]
async fn only_one_of_two_settlements_gets_the_last_unit() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let ring = app.seed_product("Aurora Ring", "aurora-ring", 250_000, 1).await;

    // Stock is advisory at placement, so both orders claim the last ring.
    let first = app
        .services
        .orders
        .create_order(user.id, order_request(vec![item("aurora-ring", 1)]))
        .await
        .unwrap();
    let second = app
        .services
        .orders
        .create_order(user.id, order_request(vec![item("aurora-ring", 1)]))
        .await
        .unwrap();

    let settle = |intent: String| {
        let settlement = app.services.settlement.clone();
        tokio::spawn(async move {
            let signature = sign(&intent, "pay_race");
            settlement
                .verify_and_settle(VerifyPaymentRequest {
                    gateway_intent_id: intent,
                    gateway_payment_id: "pay_race".to_string(),
                    gateway_signature: signature,
                })
                .await
        })
    };

    let (a, b) = tokio::join!(
        settle(first.gateway_intent_id.clone()),
        settle(second.gateway_intent_id.clone())
    );
    let results = [a.unwrap(), b.unwrap()];

    assert_eq!(
        results.iter().filter(|r| r.is_ok()).count(),
        1,
        "exactly one settlement wins: {results:?}"
    );
    let loser = results
        .into_iter()
        .find_map(|r| r.err())
        .expect("the other settlement fails");
    assert!(matches!(loser, ServiceError::OutOfStock { .. }));

    // The unit was sold exactly once.
    let stocked = app
        .services
        .catalog
        .resolve(&ProductRef::Id(ring.id))
        .await
        .unwrap();
    assert_eq!(stocked.inventory, 0);
}

#[tokio::test]
async fn other_shoppers_cannot_read_an_order() {
    let app = TestApp::new().await;
    let owner = app.seed_user("shopper@example.com").await;
    let stranger = app.seed_user("stranger@example.com").await;
    app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;

    let checkout = app
        .services
        .orders
        .create_order(owner.id, order_request(vec![item("aurora-ring", 1)]))
        .await
        .unwrap();

    let err = app
        .services
        .orders
        .get_order(checkout.order_id, stranger.id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    // Admins can.
    assert!(app
        .services
        .orders
        .get_order(checkout.order_id, stranger.id, true)
        .await
        .is_ok());
}
