// Orders and the kitchen
pub mod kitchen;
pub mod orders;
pub mod payments;

// Stock and recipes
pub mod inventory;
pub mod recipes;
pub mod smart_batch;

// Catalog and people
pub mod customers;
pub mod menu;
pub mod users;

// Analytics and Reporting
pub mod reports;
