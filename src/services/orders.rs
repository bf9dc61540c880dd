use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{order, order_item, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::PaymentGateway,
    services::catalog::{CatalogService, ProductRef},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    /// Product id or slug
    #[validate(length(min = 1))]
    pub product: String,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate]
    pub items: Vec<OrderItemRequest>,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 5, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 2000))]
    pub shipping_address: String,
}

/// Everything the storefront needs to open the payment widget.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub gateway_intent_id: String,
    /// Amount in minor currency units
    pub amount: i64,
    pub currency: String,
    /// Public gateway key id for the client-side widget
    pub key_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Order builder: prices the cart server-side and opens a payment intent.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    catalog: CatalogService,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: EventSender,
    minimum_order_amount: i64,
    currency: String,
    gateway_key_id: String,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: CatalogService,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
        minimum_order_amount: i64,
        currency: String,
        gateway_key_id: String,
    ) -> Self {
        Self {
            db,
            catalog,
            gateway,
            event_sender,
            minimum_order_amount,
            currency,
            gateway_key_id,
        }
    }

    /// Create an order for an authenticated user and open a payment intent.
    ///
    /// Prices come from the catalog, never the client; the total is the sum
    /// of frozen unit prices times quantities, in minor currency units. The
    /// stock check here is advisory only; settlement re-checks inside its
    /// transaction before decrementing.
    ///
    /// The order is committed before the gateway call. If the gateway then
    /// fails, the order stays behind as PLACED with no intent attached; it
    /// can never settle because settlement starts from an intent.
    #[instrument(skip(self, req), fields(user_id = %user_id, item_count = req.items.len()))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        req: CreateOrderRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        req.validate()?;

        if req.items.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Order must contain at least one item".to_string(),
            ));
        }
        for item in &req.items {
            if item.quantity < 1 {
                return Err(ServiceError::InvalidInput(format!(
                    "Quantity for '{}' must be at least 1",
                    item.product
                )));
            }
        }

        let refs: Vec<ProductRef> = req
            .items
            .iter()
            .map(|i| ProductRef::parse(&i.product))
            .collect();
        let products = self.catalog.resolve_many(&refs).await?;

        let mut total: i64 = 0;
        for (product, item) in products.iter().zip(&req.items) {
            if product.inventory < item.quantity {
                return Err(ServiceError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.inventory,
                });
            }
            let line_total = product
                .price
                .checked_mul(i64::from(item.quantity))
                .and_then(|line| total.checked_add(line))
                .ok_or_else(|| {
                    ServiceError::InvalidAmount(
                        "Order total exceeds the representable amount".to_string(),
                    )
                })?;
            total = line_total;
        }

        if total < self.minimum_order_amount {
            return Err(ServiceError::InvalidAmount(format!(
                "Order total {} is below the minimum of {}",
                total, self.minimum_order_amount
            )));
        }

        let order_id = Uuid::new_v4();
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(Some(user_id)),
            email: Set(req.email.clone()),
            phone: Set(req.phone.clone()),
            shipping_address: Set(req.shipping_address.clone()),
            total: Set(total),
            currency: Set(self.currency.clone()),
            status: Set(OrderStatus::Placed),
            gateway_intent_id: Set(None),
            gateway_payment_id: Set(None),
            gateway_signature: Set(None),
            ..Default::default()
        };
        order_model.insert(&txn).await.map_err(|e| {
            error!("Failed to insert order: {}", e);
            ServiceError::db_error(e)
        })?;

        for (product, item) in products.iter().zip(&req.items) {
            let line = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                quantity: Set(item.quantity),
                unit_price: Set(product.price),
                created_at: Set(chrono::Utc::now()),
            };
            line.insert(&txn).await.map_err(ServiceError::db_error)?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        // The gateway call happens after commit. The intent's receipt is our
        // order id, which is what settlement later trusts.
        let intent_id = self
            .gateway
            .create_intent(total, &self.currency, order_id)
            .await
            .map_err(|e| {
                warn!(
                    "Gateway intent creation failed; order {} stays PLACED without an intent",
                    order_id
                );
                e
            })?;

        let mut pending: order::ActiveModel = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?
            .into();
        pending.gateway_intent_id = Set(Some(intent_id.clone()));
        pending.update(&*self.db).await.map_err(ServiceError::db_error)?;

        if let Err(e) = self
            .event_sender
            .send(Event::OrderCreated {
                order_id,
                total,
                gateway_intent_id: intent_id.clone(),
            })
            .await
        {
            warn!("Failed to emit order created event: {}", e);
        }

        info!("Order {} placed for {} {}", order_id, total, self.currency);
        Ok(CheckoutResponse {
            order_id,
            gateway_intent_id: intent_id,
            amount: total,
            currency: self.currency.clone(),
            key_id: self.gateway_key_id.clone(),
        })
    }

    /// Fetch an order with its line items. Non-admin callers only see their
    /// own orders.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        requester: Uuid,
        is_admin: bool,
    ) -> Result<OrderDetails, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !is_admin && order.user_id != Some(requester) {
            return Err(ServiceError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(OrderDetails { order, items })
    }

    /// All orders for a user, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<order::Model>, ServiceError> {
        order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Public gateway key id, for the storefront widget.
    pub fn gateway_key_id(&self) -> &str {
        &self.gateway_key_id
    }
}
