pub mod address;
pub mod collection;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_image;
pub mod user;

pub use order::OrderStatus;
