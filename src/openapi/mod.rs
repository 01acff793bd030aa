use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tesorito POS API",
        version = "1.0.0",
        description = r#"
# Tesorito POS back office

Orders, kitchen display, recipe-driven inventory and sales reporting for a restaurant.

## Authentication

Sign in with `POST /api/v1/auth/login` and send the returned token on every other call:

```
Authorization: Bearer <token>
```

Each role (ADMIN, MANAGER, WAITER, CHEF) grants a fixed set of permissions; a call outside
them answers 403.

## Inventory

Marking an order DELIVERED or PAID deducts the ingredients of every line's recipe. Under the
`strict` stock policy a shortfall blocks the whole deduction and each short ingredient is
listed in the error's `details`; under `permissive` stock may go negative.

## Errors

```json
{
  "error": "Bad Request",
  "message": "Insufficient stock for 1 ingredient(s)",
  "details": ["Insufficient stock for Queso. Required: 1.5, Available: 1.0"],
  "request_id": "req-abc123",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Sign in"),
        (name = "orders", description = "Order taking and status"),
        (name = "kitchen", description = "Kitchen display"),
        (name = "inventory", description = "Ingredients, stock movements and deductions"),
        (name = "smart-batches", description = "Batch yield tracking"),
        (name = "menu", description = "Menu items"),
        (name = "recipes", description = "Ingredients consumed per menu item"),
        (name = "customers", description = "Customer records and loyalty"),
        (name = "payments", description = "Payments"),
        (name = "reports", description = "Sales reporting"),
        (name = "users", description = "Staff accounts"),
        (name = "health", description = "Probes")
    ),
    paths(
        handlers::auth::login,
        handlers::auth::me,

        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::get_order_by_number,
        handlers::orders::create_order,
        handlers::orders::add_order_items,
        handlers::orders::update_order_status,

        handlers::kitchen::board,
        handlers::kitchen::batching,

        handlers::inventory::list_inventory,
        handlers::inventory::get_low_stock,
        handlers::inventory::create_ingredient,
        handlers::inventory::update_ingredient,
        handlers::inventory::adjust_stock,
        handlers::inventory::deduct_for_order,
        handlers::inventory::usage_history,
        handlers::inventory::active_batch,
        handlers::inventory::batch_history,
        handlers::inventory::start_batch,
        handlers::inventory::finish_batch,

        handlers::menu::list_menu,
        handlers::menu::get_menu_item,
        handlers::menu::create_menu_item,
        handlers::menu::update_menu_item,
        handlers::menu::delete_menu_item,

        handlers::recipes::get_recipe,
        handlers::recipes::add_recipe_item,
        handlers::recipes::update_recipe_item,
        handlers::recipes::delete_recipe_item,

        handlers::customers::list_customers,
        handlers::customers::get_customer,
        handlers::customers::create_customer,
        handlers::customers::update_customer,
        handlers::customers::delete_customer,

        handlers::payments::record_payment,
        handlers::payments::list_payments,

        handlers::reports::sales_report,

        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::delete_user,

        handlers::health::readiness_check,
    ),
    components(schemas(crate::errors::ErrorResponse))
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
