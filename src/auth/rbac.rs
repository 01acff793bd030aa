/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Maps each staff role to the permissions it grants.
 */

use super::permissions::{permission, Actions, Resources};
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::warn;

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

fn all(resource: &str) -> String {
    permission(resource, Actions::ALL)
}

lazy_static! {
    pub static ref ROLES: HashMap<String, Role> = {
        let mut roles = HashMap::new();

        roles.insert(
            "admin".to_string(),
            Role {
                name: "admin".to_string(),
                description: "Owner or administrator with full access".to_string(),
                permissions: vec!["*".to_string()],
            },
        );

        // Everything operational plus reports, but not staff accounts
        roles.insert(
            "manager".to_string(),
            Role {
                name: "manager".to_string(),
                description: "Shift manager".to_string(),
                permissions: vec![
                    all(Resources::ORDERS),
                    all(Resources::KITCHEN),
                    all(Resources::INVENTORY),
                    all(Resources::BATCHES),
                    all(Resources::MENU),
                    all(Resources::RECIPES),
                    all(Resources::CUSTOMERS),
                    all(Resources::PAYMENTS),
                    all(Resources::REPORTS),
                ],
            },
        );

        roles.insert(
            "waiter".to_string(),
            Role {
                name: "waiter".to_string(),
                description: "Front of house: takes orders and payments".to_string(),
                permissions: vec![
                    all(Resources::ORDERS),
                    permission(Resources::MENU, Actions::READ),
                    all(Resources::CUSTOMERS),
                    all(Resources::PAYMENTS),
                ],
            },
        );

        roles.insert(
            "chef".to_string(),
            Role {
                name: "chef".to_string(),
                description: "Kitchen staff".to_string(),
                permissions: vec![
                    all(Resources::KITCHEN),
                    permission(Resources::ORDERS, Actions::READ),
                    permission(Resources::ORDERS, Actions::UPDATE),
                    permission(Resources::INVENTORY, Actions::READ),
                    all(Resources::BATCHES),
                ],
            },
        );

        roles
    };
}

/// Permissions granted to a role; unknown roles get none.
pub fn role_permissions(role_name: &str) -> Vec<String> {
    match ROLES.get(role_name) {
        Some(role) => role.permissions.clone(),
        None => {
            warn!("Role not found: {}", role_name);
            vec![]
        }
    }
}

/// Whether a granted permission covers the required one.
pub fn check_permission(granted: &str, required: &str) -> bool {
    if granted == "*" || granted == required {
        return true;
    }

    match granted.strip_suffix(":*") {
        Some(resource) => required
            .split_once(':')
            .map_or(false, |(required_resource, _)| required_resource == resource),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::consts;
    use rstest::rstest;

    fn grants(role: &str, required: &str) -> bool {
        role_permissions(role)
            .iter()
            .any(|p| check_permission(p, required))
    }

    #[rstest]
    #[case("admin", consts::USERS_MANAGE, true)]
    #[case("manager", consts::REPORTS_READ, true)]
    #[case("manager", consts::USERS_MANAGE, false)]
    #[case("waiter", consts::PAYMENTS_CREATE, true)]
    #[case("waiter", consts::MENU_READ, true)]
    #[case("waiter", consts::MENU_MANAGE, false)]
    #[case("waiter", consts::INVENTORY_READ, false)]
    #[case("chef", consts::KITCHEN_READ, true)]
    #[case("chef", consts::ORDERS_UPDATE, true)]
    #[case("chef", consts::ORDERS_CREATE, false)]
    #[case("chef", consts::BATCHES_MANAGE, true)]
    #[case("chef", consts::INVENTORY_ADJUST, false)]
    #[case("chef", consts::REPORTS_READ, false)]
    #[case("ghost", consts::ORDERS_READ, false)]
    fn role_grants(#[case] role: &str, #[case] required: &str, #[case] expected: bool) {
        assert_eq!(grants(role, required), expected);
    }

    #[test]
    fn wildcard_does_not_leak_across_resources() {
        assert!(check_permission("orders:*", "orders:read"));
        assert!(!check_permission("orders:*", "ordersarchive:read"));
        assert!(!check_permission("menu:read", "menu:manage"));
    }
}
