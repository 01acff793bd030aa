pub mod auth;
pub mod customers;
pub mod health;
pub mod inventory;
pub mod kitchen;
pub mod menu;
pub mod orders;
pub mod payments;
pub mod recipes;
pub mod reports;
pub mod users;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        customers::CustomerService,
        inventory::InventoryService,
        kitchen::KitchenService,
        menu::MenuService,
        orders::{OrderPolicy, OrderService},
        payments::PaymentService,
        recipes::RecipeService,
        reports::ReportService,
        smart_batch::SmartBatchService,
        users::UserService,
    },
};
use rust_decimal::Decimal;
use std::sync::Arc;
use validator::ValidationError;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub inventory: Arc<InventoryService>,
    pub smart_batches: Arc<SmartBatchService>,
    pub menu: Arc<MenuService>,
    pub recipes: Arc<RecipeService>,
    pub customers: Arc<CustomerService>,
    pub payments: Arc<PaymentService>,
    pub reports: Arc<ReportService>,
    pub users: Arc<UserService>,
    pub kitchen: Arc<KitchenService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let inventory = Arc::new(InventoryService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.stock_policy,
        ));

        let policy = OrderPolicy {
            tax_rate: config.tax_rate(),
            loyalty_point_value: Decimal::from(config.loyalty_point_value),
            auto_deduct_inventory: config.auto_deduct_inventory,
        };
        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            event_sender.clone(),
            inventory.clone(),
            policy,
        ));
        let payments = Arc::new(PaymentService::new(
            db_pool.clone(),
            event_sender.clone(),
            inventory.clone(),
            config.auto_deduct_inventory,
        ));

        Self {
            orders,
            payments,
            smart_batches: Arc::new(SmartBatchService::new(db_pool.clone(), event_sender)),
            menu: Arc::new(MenuService::new(db_pool.clone())),
            recipes: Arc::new(RecipeService::new(db_pool.clone())),
            customers: Arc::new(CustomerService::new(db_pool.clone())),
            reports: Arc::new(ReportService::new(db_pool.clone())),
            users: Arc::new(UserService::new(db_pool.clone())),
            kitchen: Arc::new(KitchenService::new(db_pool, config.kitchen_alert_minutes)),
            inventory,
        }
    }
}

/// Rejects negative amounts.
pub fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Rejects zero and negative amounts.
pub fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut err = ValidationError::new("positive");
        err.message = Some("must be greater than zero".into());
        return Err(err);
    }
    Ok(())
}

pub fn validate_non_zero(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_zero() {
        let mut err = ValidationError::new("non_zero");
        err.message = Some("must not be zero".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(0), true, false, false)]
    #[case(dec!(-0.01), false, false, true)]
    #[case(dec!(2.5), true, true, true)]
    fn decimal_validators(
        #[case] value: Decimal,
        #[case] non_negative: bool,
        #[case] positive: bool,
        #[case] non_zero: bool,
    ) {
        assert_eq!(validate_non_negative(&value).is_ok(), non_negative);
        assert_eq!(validate_positive(&value).is_ok(), positive);
        assert_eq!(validate_non_zero(&value).is_ok(), non_zero);
    }
}
