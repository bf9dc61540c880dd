use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{auth::AuthUser, cart::CartLine, errors::ServiceError, ApiResponse, AppState};

/// Cart endpoints. The cart lives in memory, keyed by the account; the
/// durable record is the order created at checkout.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", put(set_line))
        .route("/merge", post(merge_cart))
        .route("/", delete(clear_cart))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetLineRequest {
    pub product_id: Uuid,
    /// Zero removes the line
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MergeCartRequest {
    pub lines: Vec<CartLine>,
}

/// Current cart
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "Cart")),
    security(("Bearer" = []))
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(ApiResponse::success(state.services.cart.get(user.user_id))))
}

/// Set the quantity for one product
#[utoipa::path(
    put,
    path = "/api/v1/cart/items",
    request_body = SetLineRequest,
    responses((status = 200, description = "Updated cart")),
    security(("Bearer" = []))
)]
pub async fn set_line(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SetLineRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .set_line(user.user_id, payload.product_id, payload.quantity);
    Ok(Json(ApiResponse::success(cart)))
}

/// Merge lines from another device or a guest session
#[utoipa::path(
    post,
    path = "/api/v1/cart/merge",
    request_body = MergeCartRequest,
    responses((status = 200, description = "Merged cart")),
    security(("Bearer" = []))
)]
pub async fn merge_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<MergeCartRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.merge(user.user_id, payload.lines);
    Ok(Json(ApiResponse::success(cart)))
}

/// Drop the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses((status = 204, description = "Cart cleared")),
    security(("Bearer" = []))
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cart.clear(user.user_id);
    Ok(StatusCode::NO_CONTENT)
}
