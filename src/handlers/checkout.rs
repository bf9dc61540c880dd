use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::orders::CreateOrderRequest,
    services::settlement::VerifyPaymentRequest,
    ApiResponse, AppState,
};

/// Checkout endpoints: place an order, verify its payment, and fetch the
/// public gateway key. Order placement requires auth; verification is open
/// because the gateway signature is the proof, not a session.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/verify", post(verify_payment))
        .route("/key", get(gateway_key))
}

pub fn checkout_auth_routes() -> Router<AppState> {
    Router::new().route("/orders", post(create_order))
}

#[derive(Debug, Serialize, ToSchema)]
struct GatewayKeyResponse {
    key_id: String,
}

/// Price the cart server-side, place the order, and open a payment intent
#[utoipa::path(
    post,
    path = "/api/v1/checkout/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed, payment intent opened"),
        (status = 400, description = "Invalid input or amount", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state
        .services
        .orders
        .create_order(user.user_id, payload)
        .await?;
    // A fresh order makes the staged cart stale.
    state.services.cart.clear(user.user_id);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// Verify a payment signature and settle the order
#[utoipa::path(
    post,
    path = "/api/v1/checkout/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment settled (or already settled)"),
        (status = 400, description = "Missing fields", body = crate::errors::ErrorResponse),
        (status = 401, description = "Signature mismatch", body = crate::errors::ErrorResponse),
        (status = 422, description = "Out of stock", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::errors::ErrorResponse),
    )
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.services.settlement.verify_and_settle(payload).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Public gateway key id for the payment widget
#[utoipa::path(
    get,
    path = "/api/v1/checkout/key",
    responses((status = 200, description = "Gateway key id"))
)]
pub async fn gateway_key(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(ApiResponse::success(GatewayKeyResponse {
        key_id: state.services.orders.gateway_key_id().to_string(),
    })))
}
