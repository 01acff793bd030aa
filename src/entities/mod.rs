//! SeaORM entities for the point-of-sale schema.

pub mod customer;
pub mod ingredient;
pub mod menu_item;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod recipe_item;
pub mod smart_batch;
pub mod stock_adjustment;
pub mod user;

pub use order::OrderStatus;
pub use payment::PaymentMethod;
pub use user::UserRole;
