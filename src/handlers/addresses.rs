use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser, errors::ServiceError, services::accounts::UpsertAddressRequest, ApiResponse,
    AppState,
};

/// Address book endpoints, all scoped to the authenticated account.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_addresses).post(add_address))
        .route("/:id", put(update_address))
        .route("/:id", delete(delete_address))
}

/// List the account's addresses
#[utoipa::path(
    get,
    path = "/api/v1/account/addresses",
    responses((status = 200, description = "Addresses")),
    security(("Bearer" = []))
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let addresses = state.services.accounts.list_addresses(user.user_id).await?;
    Ok(Json(ApiResponse::success(addresses)))
}

/// Add an address
#[utoipa::path(
    post,
    path = "/api/v1/account/addresses",
    request_body = UpsertAddressRequest,
    responses((status = 201, description = "Address created")),
    security(("Bearer" = []))
)]
pub async fn add_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpsertAddressRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let address = state
        .services
        .accounts
        .add_address(user.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(address))))
}

/// Update an address
#[utoipa::path(
    put,
    path = "/api/v1/account/addresses/{id}",
    request_body = UpsertAddressRequest,
    params(("id" = Uuid, Path, description = "Address id")),
    responses(
        (status = 200, description = "Address updated"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpsertAddressRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let address = state
        .services
        .accounts
        .update_address(user.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(address)))
}

/// Delete an address
#[utoipa::path(
    delete,
    path = "/api/v1/account/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address id")),
    responses(
        (status = 204, description = "Address deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .accounts
        .delete_address(user.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
