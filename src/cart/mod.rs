use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

/// One line in a shopper's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// A shopper's cart, keyed by their user id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub owner: Uuid,
    pub lines: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    fn empty(owner: Uuid) -> Self {
        Self {
            owner,
            lines: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Change notifications published whenever a cart mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CartEvent {
    Updated { owner: Uuid, line_count: usize },
    Cleared { owner: Uuid },
}

/// In-memory cart store shared across request handlers.
///
/// Carts are transient staging for checkout; the order itself is the durable
/// record, so nothing here touches the database. Mutations publish a
/// `CartEvent` on a broadcast channel that any number of observers can
/// subscribe to; slow observers lag and drop, they never block writers.
#[derive(Clone)]
pub struct CartStore {
    carts: Arc<DashMap<Uuid, Cart>>,
    notifier: broadcast::Sender<CartEvent>,
}

impl Default for CartStore {
    fn default() -> Self {
        let (notifier, _) = broadcast::channel(64);
        Self {
            carts: Arc::new(DashMap::new()),
            notifier,
        }
    }
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to cart change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.notifier.subscribe()
    }

    /// Current cart for `owner`, empty if they have none.
    pub fn get(&self, owner: Uuid) -> Cart {
        self.carts
            .get(&owner)
            .map(|c| c.clone())
            .unwrap_or_else(|| Cart::empty(owner))
    }

    /// Set the quantity for a product. Zero or negative removes the line.
    pub fn set_line(&self, owner: Uuid, product_id: Uuid, quantity: i32) -> Cart {
        let mut entry = self
            .carts
            .entry(owner)
            .or_insert_with(|| Cart::empty(owner));

        entry.lines.retain(|l| l.product_id != product_id);
        if quantity > 0 {
            entry.lines.push(CartLine {
                product_id,
                quantity,
            });
        }
        entry.updated_at = Utc::now();
        let cart = entry.clone();
        drop(entry);

        self.notify(CartEvent::Updated {
            owner,
            line_count: cart.lines.len(),
        });
        cart
    }

    /// Merge lines carried over from another device or a guest session.
    ///
    /// For products present in both, the incoming quantity wins; lines only
    /// one side has are kept. Last write wins per product, quantities are
    /// never summed, so replaying a merge cannot inflate the cart.
    pub fn merge(&self, owner: Uuid, incoming: Vec<CartLine>) -> Cart {
        let mut entry = self
            .carts
            .entry(owner)
            .or_insert_with(|| Cart::empty(owner));

        for line in incoming {
            entry.lines.retain(|l| l.product_id != line.product_id);
            if line.quantity > 0 {
                entry.lines.push(line);
            }
        }
        entry.updated_at = Utc::now();
        let cart = entry.clone();
        drop(entry);

        self.notify(CartEvent::Updated {
            owner,
            line_count: cart.lines.len(),
        });
        cart
    }

    /// Drop the owner's cart entirely. Checkout calls this after an order
    /// is placed.
    pub fn clear(&self, owner: Uuid) {
        if self.carts.remove(&owner).is_some() {
            self.notify(CartEvent::Cleared { owner });
        }
    }

    fn notify(&self, event: CartEvent) {
        // Err only means nobody is subscribed right now.
        let _ = self.notifier.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_line_replaces_quantity() {
        let store = CartStore::new();
        let owner = Uuid::new_v4();
        let ring = Uuid::new_v4();

        store.set_line(owner, ring, 2);
        let cart = store.set_line(owner, ring, 5);

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
    }

    #[test]
    fn zero_quantity_removes_line() {
        let store = CartStore::new();
        let owner = Uuid::new_v4();
        let ring = Uuid::new_v4();

        store.set_line(owner, ring, 2);
        let cart = store.set_line(owner, ring, 0);
        assert!(cart.lines.is_empty());
    }

    #[test]
    fn merge_prefers_incoming_and_keeps_local_only_lines() {
        let store = CartStore::new();
        let owner = Uuid::new_v4();
        let ring = Uuid::new_v4();
        let necklace = Uuid::new_v4();
        let bangle = Uuid::new_v4();

        store.set_line(owner, ring, 1);
        store.set_line(owner, necklace, 3);

        let cart = store.merge(
            owner,
            vec![
                CartLine {
                    product_id: ring,
                    quantity: 4,
                },
                CartLine {
                    product_id: bangle,
                    quantity: 1,
                },
            ],
        );

        assert_eq!(cart.lines.len(), 3);
        let qty = |id| {
            cart.lines
                .iter()
                .find(|l| l.product_id == id)
                .map(|l| l.quantity)
        };
        assert_eq!(qty(ring), Some(4));
        assert_eq!(qty(necklace), Some(3));
        assert_eq!(qty(bangle), Some(1));
    }

    #[test]
    fn merge_is_idempotent() {
        let store = CartStore::new();
        let owner = Uuid::new_v4();
        let ring = Uuid::new_v4();
        let incoming = vec![CartLine {
            product_id: ring,
            quantity: 2,
        }];

        store.merge(owner, incoming.clone());
        let cart = store.merge(owner, incoming);

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn mutations_notify_subscribers() {
        let store = CartStore::new();
        let mut rx = store.subscribe();
        let owner = Uuid::new_v4();

        store.set_line(owner, Uuid::new_v4(), 1);
        store.clear(owner);

        match rx.recv().await.unwrap() {
            CartEvent::Updated {
                owner: got,
                line_count,
            } => {
                assert_eq!(got, owner);
                assert_eq!(line_count, 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(rx.recv().await.unwrap(), CartEvent::Cleared { .. }));
    }

    #[test]
    fn clearing_a_missing_cart_is_a_no_op() {
        let store = CartStore::new();
        let mut rx = store.subscribe();
        store.clear(Uuid::new_v4());
        assert!(rx.try_recv().is_err());
    }
}
