use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::mpsc;
use uuid::Uuid;

use aurum_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::user,
    errors::ServiceError,
    events::{self, EventSender},
    gateway::{IntentDetails, PaymentGateway},
    handlers::AppServices,
    services::accounts::RegisterRequest,
    services::catalog::CreateProductRequest,
};

pub const GATEWAY_SECRET: &str = "test_gateway_secret";
const TEST_JWT_SECRET: &str = "zK8mQ2vN4pX7rT1wY5bC9dF3gH6jL0aS8eU2iO4kM7nB1vZ5xJ9qW3tR6yP0cE4h";

/// In-memory gateway double. Intents live in a map; `fail_create` simulates
/// the gateway being down during checkout.
pub struct FakeGateway {
    intents: Mutex<HashMap<String, IntentDetails>>,
    counter: AtomicU64,
    pub fail_create: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            intents: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
            fail_create: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        receipt: Uuid,
    ) -> Result<String, ServiceError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayUnavailable(
                "simulated outage".to_string(),
            ));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("order_test_{n}");
        self.intents.lock().unwrap().insert(
            id.clone(),
            IntentDetails {
                id: id.clone(),
                receipt: receipt.to_string(),
                amount,
                currency: currency.to_string(),
            },
        );
        Ok(id)
    }

    async fn fetch_intent(&self, intent_id: &str) -> Result<IntentDetails, ServiceError> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment intent {} not found", intent_id))
            })
    }
}

/// Sign the way the gateway would.
pub fn sign(intent_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(GATEWAY_SECRET.as_bytes()).unwrap();
    mac.update(format!("{intent_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Test harness: fresh SQLite database, real services, fake gateway.
pub struct TestApp {
    pub services: AppServices,
    pub gateway: Arc<FakeGateway>,
    #[allow(dead_code)]
    pub auth_service: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
    _tmp: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().expect("temp dir");
        let db_path = tmp.path().join("aurum_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
            "rzp_test_key".to_string(),
            GATEWAY_SECRET.to_string(),
        );
        cfg.admin_emails = Some("admin@example.com".to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            TEST_JWT_SECRET.to_string(),
            Duration::from_secs(3600),
        )));

        let gateway = Arc::new(FakeGateway::new());
        let services = AppServices::new(
            db_arc,
            event_sender,
            auth_service.clone(),
            gateway.clone(),
            &cfg,
        );

        Self {
            services,
            gateway,
            auth_service,
            _event_task: event_task,
            _tmp: tmp,
        }
    }

    /// Register a shopper and return their account.
    pub async fn seed_user(&self, email: &str) -> user::Model {
        self.services
            .accounts
            .register(RegisterRequest {
                email: email.to_string(),
                password: "correct-horse-battery".to_string(),
                name: "Test Shopper".to_string(),
                phone: Some("+919999999999".to_string()),
            })
            .await
            .expect("register test user")
    }

    /// Seed a catalog product with the given price (paise) and stock.
    pub async fn seed_product(
        &self,
        name: &str,
        slug: &str,
        price: i64,
        inventory: i32,
    ) -> aurum_api::entities::product::Model {
        self.services
            .catalog
            .create_product(CreateProductRequest {
                name: name.to_string(),
                slug: slug.to_string(),
                description: None,
                price,
                compare_at_price: None,
                inventory,
                collection_id: None,
                tags: None,
                images: vec![],
            })
            .await
            .expect("seed product")
    }
}
