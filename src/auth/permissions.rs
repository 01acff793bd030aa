/*!
 * # Permissions Module
 *
 * Permission strings are `resource:action`. A role may hold `resource:*`
 * to cover every action on a resource, or `*` for everything.
 */

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const CREATE: &'static str = "create";
    pub const UPDATE: &'static str = "update";
    pub const MANAGE: &'static str = "manage";
    pub const ALL: &'static str = "*";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const ORDERS: &'static str = "orders";
    pub const KITCHEN: &'static str = "kitchen";
    pub const INVENTORY: &'static str = "inventory";
    pub const BATCHES: &'static str = "batches";
    pub const MENU: &'static str = "menu";
    pub const RECIPES: &'static str = "recipes";
    pub const CUSTOMERS: &'static str = "customers";
    pub const PAYMENTS: &'static str = "payments";
    pub const REPORTS: &'static str = "reports";
    pub const USERS: &'static str = "users";
}

/// Builds `resource:action`.
pub fn permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Permission string constants used by the router
pub mod consts {
    // Orders
    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_CREATE: &str = "orders:create";
    pub const ORDERS_UPDATE: &str = "orders:update";

    // Kitchen display
    pub const KITCHEN_READ: &str = "kitchen:read";

    // Inventory
    pub const INVENTORY_READ: &str = "inventory:read";
    pub const INVENTORY_ADJUST: &str = "inventory:adjust";
    pub const INVENTORY_MANAGE: &str = "inventory:manage";

    // Smart batches
    pub const BATCHES_READ: &str = "batches:read";
    pub const BATCHES_MANAGE: &str = "batches:manage";

    // Menu and recipes
    pub const MENU_READ: &str = "menu:read";
    pub const MENU_MANAGE: &str = "menu:manage";
    pub const RECIPES_READ: &str = "recipes:read";
    pub const RECIPES_MANAGE: &str = "recipes:manage";

    // Customers
    pub const CUSTOMERS_READ: &str = "customers:read";
    pub const CUSTOMERS_MANAGE: &str = "customers:manage";

    // Payments
    pub const PAYMENTS_READ: &str = "payments:read";
    pub const PAYMENTS_CREATE: &str = "payments:create";

    // Reports
    pub const REPORTS_READ: &str = "reports:read";

    // Users
    pub const USERS_READ: &str = "users:read";
    pub const USERS_MANAGE: &str = "users:manage";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_follow_resource_action_format() {
        assert_eq!(
            permission(Resources::ORDERS, Actions::UPDATE),
            consts::ORDERS_UPDATE
        );
        assert_eq!(
            permission(Resources::BATCHES, Actions::MANAGE),
            consts::BATCHES_MANAGE
        );
        assert_eq!(permission(Resources::MENU, Actions::ALL), "menu:*");
    }
}
