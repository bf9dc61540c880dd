pub mod auth;
pub mod cart;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::AuthRouterExt;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Full v1 API surface.
///
/// Public reads stay open; account, cart, and checkout order placement sit
/// behind auth; catalog writes and fulfilment transitions require the admin
/// role. Payment verification is open because the gateway signature itself
/// is the proof of authenticity.
pub fn api_v1_routes() -> Router<AppState> {
    let account = Router::new()
        .merge(handlers::auth::profile_routes())
        .nest("/addresses", handlers::addresses::address_routes())
        .with_auth();

    let admin = Router::new()
        .nest("/products", handlers::products::product_admin_routes())
        .nest("/collections", handlers::collections::collection_admin_routes())
        .nest("/orders", handlers::orders::order_admin_routes())
        .with_role("admin");

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest("/auth", handlers::auth::auth_routes())
        .nest("/account", account)
        .nest("/products", handlers::products::product_routes())
        .nest("/collections", handlers::collections::collection_routes())
        .nest("/cart", handlers::carts::cart_routes().with_auth())
        .nest(
            "/checkout",
            handlers::checkout::checkout_routes()
                .merge(handlers::checkout::checkout_auth_routes().with_auth()),
        )
        .nest("/orders", handlers::orders::order_routes().with_auth())
        .nest("/admin", admin)
}

async fn api_status() -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "aurum-api",
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(health_data)))
}
