pub mod addresses;
pub mod auth;
pub mod carts;
pub mod checkout;
pub mod collections;
pub mod orders;
pub mod products;

use std::sync::Arc;

use crate::{
    auth::AuthService,
    cart::CartStore,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    gateway::PaymentGateway,
    services::{
        AccountService, CatalogService, OrderService, OrderStatusService, SettlementService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrderService>,
    pub settlement: Arc<SettlementService>,
    pub order_status: Arc<OrderStatusService>,
    pub cart: CartStore,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        auth_service: Arc<AuthService>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        let catalog = CatalogService::new(db.clone(), event_sender.clone());

        let accounts = Arc::new(AccountService::new(
            db.clone(),
            auth_service,
            event_sender.clone(),
            config.admin_email_list(),
        ));
        let orders = Arc::new(OrderService::new(
            db.clone(),
            catalog.clone(),
            gateway.clone(),
            event_sender.clone(),
            config.minimum_order_amount,
            config.default_currency.clone(),
            config.gateway_key_id.clone(),
        ));
        let settlement = Arc::new(SettlementService::new(
            db.clone(),
            gateway,
            event_sender.clone(),
            config.gateway_key_secret.clone(),
        ));
        let order_status = Arc::new(OrderStatusService::new(db, event_sender));

        Self {
            accounts,
            catalog: Arc::new(catalog),
            orders,
            settlement,
            order_status,
            cart: CartStore::new(),
        }
    }
}
