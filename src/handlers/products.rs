use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{product, product_image},
    errors::ServiceError,
    services::catalog::{
        AddProductImageRequest, CreateProductRequest, ProductRef, UpdateProductRequest,
    },
    ApiResponse, AppState,
};

/// Public catalog reads.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:reference", get(get_product))
}

/// Admin-only catalog writes; gated with the admin role in the router.
///
/// `DELETE /:id` refuses when the product appears in any order.
/// `POST /:id/purge` is the separately named force-delete that removes the
/// order lines too; the default delete never cascades.
pub fn product_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
        .route("/:id/purge", post(purge_product))
        .route("/:id/images", post(add_product_image))
        .route("/:id/images/:image_id", delete(remove_product_image))
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    q: Option<String>,
    collection: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: product::Model,
    pub images: Vec<product_image::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeResponse {
    pub product_id: Uuid,
    pub removed_order_lines: u64,
}

/// List products, optionally filtered by name substring and collection slug
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(
        ("q" = Option<String>, Query, description = "Name substring filter"),
        ("collection" = Option<String>, Query, description = "Collection slug filter"),
    ),
    responses((status = 200, description = "Products"))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state
        .services
        .catalog
        .list_products(query.q, query.collection)
        .await?;
    Ok(Json(ApiResponse::success(products)))
}

/// Product detail by id or slug
#[utoipa::path(
    get,
    path = "/api/v1/products/{reference}",
    params(("reference" = String, Path, description = "Product id or slug")),
    responses(
        (status = 200, description = "Product", body = ProductDetail),
        (status = 400, description = "Unknown product", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let reference = ProductRef::parse(&reference);
    let (product, images) = state.services.catalog.get_product(&reference).await?;
    Ok(Json(ApiResponse::success(ProductDetail { product, images })))
}

/// Create a product
#[utoipa::path(
    post,
    path = "/api/v1/admin/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created"),
        (status = 409, description = "Slug taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.create_product(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/api/v1/admin/products/{id}",
    request_body = UpdateProductRequest,
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product updated"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.update_product(id, payload).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Delete a product, refusing when order history references it
#[utoipa::path(
    delete,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Referenced by orders", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.catalog.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Force-delete a product together with its order lines
#[utoipa::path(
    post,
    path = "/api/v1/admin/products/{id}/purge",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product purged", body = PurgeResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn purge_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let removed = state.services.catalog.purge_product(id).await?;
    Ok(Json(ApiResponse::success(PurgeResponse {
        product_id: id,
        removed_order_lines: removed,
    })))
}

/// Add an image to a product's gallery
#[utoipa::path(
    post,
    path = "/api/v1/admin/products/{id}/images",
    request_body = AddProductImageRequest,
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 201, description = "Image added"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn add_product_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddProductImageRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let image = state.services.catalog.add_product_image(id, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(image))))
}

/// Remove an image from a product's gallery
#[utoipa::path(
    delete,
    path = "/api/v1/admin/products/{id}/images/{image_id}",
    params(
        ("id" = Uuid, Path, description = "Product id"),
        ("image_id" = Uuid, Path, description = "Image id"),
    ),
    responses(
        (status = 204, description = "Image removed"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn remove_product_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.catalog.remove_product_image(id, image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
