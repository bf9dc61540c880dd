use std::sync::Arc;

use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, TransactionTrait};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{order, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Fulfilment status machine for settled orders.
///
/// The lifecycle moves strictly forward: PLACED, PAID, SHIPPED, DELIVERED.
/// Payment is the only way into PAID (see the settlement service); this
/// service owns the two fulfilment steps after it.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Mark an order shipped. Requires PAID.
    #[instrument(skip(self))]
    pub async fn mark_shipped(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.advance(order_id, OrderStatus::Paid, OrderStatus::Shipped)
            .await
    }

    /// Mark an order delivered. Requires SHIPPED.
    #[instrument(skip(self))]
    pub async fn mark_delivered(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.advance(order_id, OrderStatus::Shipped, OrderStatus::Delivered)
            .await
    }

    /// Move an order from `expected` to `target`.
    ///
    /// Re-applying a transition the order already took is a no-op success,
    /// so a double-clicked admin button never errors. Every other mismatch
    /// is an invalid transition.
    async fn advance(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        target: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.status == target {
            info!("Order {} is already {}; no-op", order_id, target);
            return Ok(order);
        }
        if order.status != expected {
            warn!(
                "Refusing transition of order {} from {} to {}",
                order_id, order.status, target
            );
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot move order from {} to {}",
                order.status, target
            )));
        }

        let old_status = order.status;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(target);
        let updated = active.update(&txn).await.map_err(|e| {
            error!("Failed to update order {} status: {}", order_id, e);
            ServiceError::db_error(e)
        })?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Err(e) = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status: target,
            })
            .await
        {
            warn!("Failed to emit status change event: {}", e);
        }

        info!("Order {} moved from {} to {}", order_id, old_status, target);
        Ok(updated)
    }
}
