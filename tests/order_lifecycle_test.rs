//! Fulfilment state machine scenarios: PLACED, PAID, SHIPPED, DELIVERED.

mod common;

use common::{sign, TestApp};

use aurum_api::{
    entities::OrderStatus,
    errors::ServiceError,
    services::orders::{CreateOrderRequest, OrderItemRequest},
    services::settlement::VerifyPaymentRequest,
};
use uuid::Uuid;

async fn placed_order(app: &TestApp, user_id: Uuid) -> (Uuid, String) {
    app.seed_product("Aurora Ring", "aurora-ring", 250_000, 10).await;
    let checkout = app
        .services
        .orders
        .create_order(
            user_id,
            CreateOrderRequest {
                items: vec![OrderItemRequest {
                    product: "aurora-ring".to_string(),
                    quantity: 1,
                }],
                email: "shopper@example.com".to_string(),
                phone: "+919999999999".to_string(),
                shipping_address: "12 Marine Drive, Mumbai 400001".to_string(),
            },
        )
        .await
        .unwrap();
    (checkout.order_id, checkout.gateway_intent_id)
}

async fn settle(app: &TestApp, intent_id: &str) {
    app.services
        .settlement
        .verify_and_settle(VerifyPaymentRequest {
            gateway_intent_id: intent_id.to_string(),
            gateway_payment_id: "pay_001".to_string(),
            gateway_signature: sign(intent_id, "pay_001"),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn full_lifecycle_moves_forward() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let (order_id, intent_id) = placed_order(&app, user.id).await;

    settle(&app, &intent_id).await;

    let shipped = app.services.order_status.mark_shipped(order_id).await.unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);

    let delivered = app
        .services
        .order_status
        .mark_delivered(order_id)
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn unpaid_orders_cannot_ship() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let (order_id, _) = placed_order(&app, user.id).await;

    let err = app
        .services
        .order_status
        .mark_shipped(order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn unshipped_orders_cannot_deliver() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let (order_id, intent_id) = placed_order(&app, user.id).await;
    settle(&app, &intent_id).await;

    let err = app
        .services
        .order_status
        .mark_delivered(order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn repeating_a_transition_is_a_no_op() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let (order_id, intent_id) = placed_order(&app, user.id).await;
    settle(&app, &intent_id).await;

    app.services.order_status.mark_shipped(order_id).await.unwrap();
    let again = app
        .services
        .order_status
        .mark_shipped(order_id)
        .await
        .expect("double-ship is a no-op success");
    assert_eq!(again.status, OrderStatus::Shipped);
}

#[tokio::test]
async fn delivered_orders_cannot_move_backwards() {
    let app = TestApp::new().await;
    let user = app.seed_user("shopper@example.com").await;
    let (order_id, intent_id) = placed_order(&app, user.id).await;
    settle(&app, &intent_id).await;
    app.services.order_status.mark_shipped(order_id).await.unwrap();
    app.services.order_status.mark_delivered(order_id).await.unwrap();

    let err = app
        .services
        .order_status
        .mark_shipped(order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn missing_orders_are_reported() {
    let app = TestApp::new().await;
    let err = app
        .services
        .order_status
        .mark_shipped(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
