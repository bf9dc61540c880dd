use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Aurum API",
        version = "0.1.0",
        description = r#"
# Aurum Jewelry Storefront API

Storefront backend for a jewelry catalog with a signature-verified checkout
and settlement flow.

## Money

All amounts are integer minor currency units (paise). There are no decimal
amounts anywhere in the API.

## Authentication

Account, cart, and checkout endpoints require a JWT bearer token:

```
Authorization: Bearer <token>
```

Admin endpoints additionally require the admin role, which is granted at
login to configured admin accounts.

## Checkout flow

1. `POST /api/v1/checkout/orders` prices the cart server-side, stores a
   PLACED order with frozen prices, and opens a payment intent.
2. The client completes payment against the gateway.
3. `POST /api/v1/checkout/verify` proves the payment via an HMAC signature,
   re-checks stock, decrements inventory, and flips the order to PAID.
        "#,
        contact(name = "Aurum Support", email = "support@aurum.example")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Account", description = "Profile and address book"),
        (name = "Catalog", description = "Products and collections"),
        (name = "Cart", description = "In-memory cart staging"),
        (name = "Checkout", description = "Order placement and settlement"),
        (name = "Orders", description = "Order history and fulfilment"),
        (name = "Admin", description = "Administrative endpoints")
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::me,
        crate::handlers::addresses::list_addresses,
        crate::handlers::addresses::add_address,
        crate::handlers::addresses::update_address,
        crate::handlers::addresses::delete_address,
        crate::handlers::collections::list_collections,
        crate::handlers::collections::create_collection,
        crate::handlers::collections::update_collection,
        crate::handlers::collections::delete_collection,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::purge_product,
        crate::handlers::products::add_product_image,
        crate::handlers::products::remove_product_image,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::set_line,
        crate::handlers::carts::merge_cart,
        crate::handlers::carts::clear_cart,
        crate::handlers::checkout::create_order,
        crate::handlers::checkout::verify_payment,
        crate::handlers::checkout::gateway_key,
        crate::handlers::orders::list_my_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::mark_shipped,
        crate::handlers::orders::mark_delivered,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::entities::OrderStatus,
            crate::cart::CartLine,
            crate::cart::Cart,
            crate::auth::TokenPair,
            crate::services::accounts::RegisterRequest,
            crate::services::accounts::LoginRequest,
            crate::services::accounts::UpsertAddressRequest,
            crate::services::catalog::CreateProductRequest,
            crate::services::catalog::UpdateProductRequest,
            crate::services::catalog::CreateCollectionRequest,
            crate::services::catalog::UpdateCollectionRequest,
            crate::services::catalog::AddProductImageRequest,
            crate::services::orders::OrderItemRequest,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::CheckoutResponse,
            crate::services::settlement::VerifyPaymentRequest,
            crate::services::settlement::SettlementResponse,
            crate::handlers::products::ProductDetail,
            crate::handlers::products::PurgeResponse,
            crate::handlers::carts::SetLineRequest,
            crate::handlers::carts::MergeCartRequest,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
