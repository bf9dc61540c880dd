use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::OrderStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// The events the storefront emits. Settlement and status transitions emit
// after their transaction commits, never before.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Account events
    UserRegistered(Uuid),
    UserLoggedIn(Uuid),

    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    ProductPurged(Uuid),
    CollectionCreated(Uuid),
    CollectionDeleted(Uuid),

    // Order events
    OrderCreated {
        order_id: Uuid,
        total: i64,
        gateway_intent_id: String,
    },
    OrderSettled {
        order_id: Uuid,
        gateway_payment_id: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
}

/// Drains the event channel and logs each event.
///
/// The channel exists so emitters never block on downstream consumers; this
/// processor is the single consumer.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                total,
                gateway_intent_id,
            } => {
                info!(
                    %order_id,
                    total,
                    gateway_intent_id,
                    "Order placed, awaiting payment"
                );
            }
            Event::OrderSettled {
                order_id,
                gateway_payment_id,
            } => {
                info!(%order_id, gateway_payment_id, "Order payment settled");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    %order_id,
                    %old_status,
                    %new_status,
                    "Order status changed"
                );
            }
            Event::ProductPurged(product_id) => {
                warn!(%product_id, "Product purged along with its order history");
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();

        sender
            .send(Event::OrderSettled {
                order_id,
                gateway_payment_id: "pay_123".to_string(),
            })
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            Event::OrderSettled {
                order_id: got,
                gateway_payment_id,
            } => {
                assert_eq!(got, order_id);
                assert_eq!(gateway_payment_id, "pay_123");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::UserLoggedIn(Uuid::new_v4())).await.is_err());
    }
}
