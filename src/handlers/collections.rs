use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    services::catalog::{CreateCollectionRequest, UpdateCollectionRequest},
    ApiResponse, AppState,
};

/// Public collection reads.
pub fn collection_routes() -> Router<AppState> {
    Router::new().route("/", get(list_collections))
}

/// Admin-only collection writes; gated with the admin role in the router.
pub fn collection_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_collection))
        .route("/:id", put(update_collection))
        .route("/:id", delete(delete_collection))
}

/// List collections
#[utoipa::path(
    get,
    path = "/api/v1/collections",
    responses((status = 200, description = "Collections"))
)]
pub async fn list_collections(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let collections = state.services.catalog.list_collections().await?;
    Ok(Json(ApiResponse::success(collections)))
}

/// Create a collection
#[utoipa::path(
    post,
    path = "/api/v1/admin/collections",
    request_body = CreateCollectionRequest,
    responses(
        (status = 201, description = "Collection created"),
        (status = 409, description = "Slug taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_collection(
    State(state): State<AppState>,
    Json(payload): Json<CreateCollectionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let collection = state.services.catalog.create_collection(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(collection))))
}

/// Update a collection
#[utoipa::path(
    put,
    path = "/api/v1/admin/collections/{id}",
    request_body = UpdateCollectionRequest,
    params(("id" = Uuid, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Collection updated"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slug taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCollectionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let collection = state.services.catalog.update_collection(id, payload).await?;
    Ok(Json(ApiResponse::success(collection)))
}

/// Delete a collection; its products are detached, not removed
#[utoipa::path(
    delete,
    path = "/api/v1/admin/collections/{id}",
    params(("id" = Uuid, Path, description = "Collection id")),
    responses(
        (status = 204, description = "Collection deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.catalog.delete_collection(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
