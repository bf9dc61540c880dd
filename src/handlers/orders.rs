use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{auth::AuthUser, errors::ServiceError, ApiResponse, AppState};

/// Order reads for the authenticated account.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_orders))
        .route("/:id", get(get_order))
}

/// Admin fulfilment transitions.
pub fn order_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/:id/ship", post(mark_shipped))
        .route("/:id/deliver", post(mark_delivered))
}

/// List the caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses((status = 200, description = "Orders")),
    security(("Bearer" = []))
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state
        .services
        .orders
        .list_orders_for_user(user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Fetch one order with its line items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order"),
        (status = 403, description = "Not your order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let details = state
        .services
        .orders
        .get_order(id, user.user_id, user.is_admin())
        .await?;
    Ok(Json(ApiResponse::success(details)))
}

/// Mark a paid order as shipped
#[utoipa::path(
    post,
    path = "/api/v1/admin/orders/{id}/ship",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order shipped"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invalid transition", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn mark_shipped(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.order_status.mark_shipped(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Mark a shipped order as delivered
#[utoipa::path(
    post,
    path = "/api/v1/admin/orders/{id}/deliver",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order delivered"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invalid transition", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn mark_delivered(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.order_status.mark_delivered(id).await?;
    Ok(Json(ApiResponse::success(order)))
}
