pub mod accounts;
pub mod catalog;
pub mod order_status;
pub mod orders;
pub mod settlement;

pub use accounts::AccountService;
pub use catalog::CatalogService;
pub use order_status::OrderStatusService;
pub use orders::OrderService;
pub use settlement::SettlementService;
