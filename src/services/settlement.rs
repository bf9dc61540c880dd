use std::sync::Arc;

use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{order, order_item, product, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{verify_settlement_signature, PaymentGateway},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub gateway_intent_id: String,
    pub gateway_payment_id: String,
    pub gateway_signature: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettlementResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

/// Settlement verifier: proves a payment happened and commits its effects.
#[derive(Clone)]
pub struct SettlementService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: EventSender,
    gateway_secret: String,
}

impl SettlementService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
        gateway_secret: String,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
            gateway_secret,
        }
    }

    /// Verify a gateway callback and settle the order it belongs to.
    ///
    /// The signature must check out before anything else happens, and the
    /// order is identified by the receipt recovered from the gateway, never
    /// by anything the client claims. Inventory is re-checked and decremented
    /// in the same transaction that flips the order to PAID, all lines or
    /// none. Settling an order that is already PAID or further along is a
    /// no-op success, which makes gateway retries safe.
    #[instrument(skip(self, req), fields(intent_id = %req.gateway_intent_id))]
    pub async fn verify_and_settle(
        &self,
        req: VerifyPaymentRequest,
    ) -> Result<SettlementResponse, ServiceError> {
        if req.gateway_intent_id.trim().is_empty()
            || req.gateway_payment_id.trim().is_empty()
            || req.gateway_signature.trim().is_empty()
        {
            return Err(ServiceError::InvalidInput(
                "Intent id, payment id, and signature are all required".to_string(),
            ));
        }

        let authentic = verify_settlement_signature(
            &self.gateway_secret,
            &req.gateway_intent_id,
            &req.gateway_payment_id,
            &req.gateway_signature,
        )?;
        if !authentic {
            warn!("Settlement signature mismatch");
            return Err(ServiceError::SignatureMismatch);
        }

        let intent = self.gateway.fetch_intent(&req.gateway_intent_id).await?;
        let order_id = Uuid::parse_str(&intent.receipt).map_err(|_| {
            error!("Intent {} carries a malformed receipt", req.gateway_intent_id);
            ServiceError::InternalError(format!(
                "Intent {} has an unusable receipt",
                req.gateway_intent_id
            ))
        })?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        // Gateway retries and double-submits land here.
        if order.status >= OrderStatus::Paid {
            info!("Order {} already settled; treating as success", order_id);
            return Ok(SettlementResponse {
                order_id,
                status: order.status,
            });
        }

        // Claim the order first with a guarded update. The status predicate
        // is re-evaluated on the committed row under read-committed
        // isolation, so a racing duplicate callback affects zero rows
        // instead of settling twice.
        let claimed = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Paid))
            .col_expr(
                order::Column::GatewayIntentId,
                Expr::value(req.gateway_intent_id.clone()),
            )
            .col_expr(
                order::Column::GatewayPaymentId,
                Expr::value(req.gateway_payment_id.clone()),
            )
            .col_expr(
                order::Column::GatewaySignature,
                Expr::value(req.gateway_signature.clone()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Placed))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if claimed.rows_affected == 0 {
            info!(
                "Order {} was settled by a concurrent callback; treating as success",
                order_id
            );
            return Ok(SettlementResponse {
                order_id,
                status: OrderStatus::Paid,
            });
        }

        let mut lines = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        // Fixed lock order across concurrent settlements.
        lines.sort_by_key(|l| l.product_id);

        // Compare-and-decrement per line. The inventory predicate makes the
        // check and the write one statement; a shortfall aborts the whole
        // transaction, undoing the claim and any earlier decrements.
        for line in &lines {
            let decremented = product::Entity::update_many()
                .col_expr(
                    product::Column::Inventory,
                    Expr::col(product::Column::Inventory).sub(line.quantity),
                )
                .filter(product::Column::Id.eq(line.product_id))
                .filter(product::Column::Inventory.gte(line.quantity))
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            if decremented.rows_affected == 0 {
                let name = product::Entity::find_by_id(line.product_id)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .map(|p| p.name)
                    .unwrap_or_else(|| line.product_id.to_string());
                warn!(
                    "Order {} cannot settle: {} is short of the {} needed",
                    order_id, name, line.quantity
                );
                return Err(ServiceError::OutOfStock { product: name });
            }
        }

        txn.commit().await.map_err(|e| {
            error!("Failed to commit settlement for order {}: {}", order_id, e);
            ServiceError::db_error(e)
        })?;

        if let Err(e) = self
            .event_sender
            .send(Event::OrderSettled {
                order_id,
                gateway_payment_id: req.gateway_payment_id,
            })
            .await
        {
            warn!("Failed to emit order settled event: {}", e);
        }

        info!("Order {} settled", order_id);
        Ok(SettlementResponse {
            order_id,
            status: OrderStatus::Paid,
        })
    }
}
