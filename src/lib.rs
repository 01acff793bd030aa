//! Tesorito POS back office
//!
//! Orders, kitchen display, recipe-driven inventory, smart batch yield
//! tracking, customers, payments and sales reports for a small restaurant,
//! served as a JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, patch, post, put},
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AuthRouterExt, AuthService};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires every service over one pool and one event channel.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services =
            handlers::AppServices::new(db.clone(), Arc::new(event_sender.clone()), &config);
        let auth = Arc::new(AuthService::new(auth::AuthConfig::from(&config)));
        Self {
            db,
            config: Arc::new(config),
            event_sender,
            services,
            auth,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn message_is_serialized_next_to_data() {
        let response = ApiResponse::success(3).with_message("Order #003 created");
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], 3);
        assert_eq!(body["message"], "Order #003 created");
        assert!(body["meta"]["request_id"].is_null());
    }
}

/// Versioned JSON API. Every route except login needs a bearer token, and
/// each group is gated on one permission.
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{
        auth as auth_h, customers, inventory, kitchen, menu, orders, payments, recipes, reports,
        users,
    };

    let orders_read = Router::new()
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route(
            "/orders/by-number/:order_number",
            get(orders::get_order_by_number),
        )
        .with_permission(perm::ORDERS_READ);

    let orders_create = Router::new()
        .route("/orders", post(orders::create_order))
        .with_permission(perm::ORDERS_CREATE);

    let orders_update = Router::new()
        .route("/orders/:id/items", patch(orders::add_order_items))
        .route("/orders/:id/status", patch(orders::update_order_status))
        .with_permission(perm::ORDERS_UPDATE);

    let kitchen_read = Router::new()
        .route("/kitchen/board", get(kitchen::board))
        .route("/kitchen/batching", get(kitchen::batching))
        .with_permission(perm::KITCHEN_READ);

    let inventory_read = Router::new()
        .route("/inventory", get(inventory::list_inventory))
        .route("/inventory/low-stock", get(inventory::get_low_stock))
        .route("/inventory/:id/history", get(inventory::usage_history))
        .with_permission(perm::INVENTORY_READ);

    let inventory_adjust = Router::new()
        .route("/inventory/adjust", patch(inventory::adjust_stock))
        .route("/inventory/deduct", post(inventory::deduct_for_order))
        .with_permission(perm::INVENTORY_ADJUST);

    let inventory_manage = Router::new()
        .route("/inventory", post(inventory::create_ingredient))
        .route("/inventory/:id", put(inventory::update_ingredient))
        .with_permission(perm::INVENTORY_MANAGE);

    let batches_read = Router::new()
        .route("/inventory/smart-batch", get(inventory::active_batch))
        .route(
            "/inventory/smart-batch/history",
            get(inventory::batch_history),
        )
        .with_permission(perm::BATCHES_READ);

    let batches_manage = Router::new()
        .route("/inventory/smart-batch", post(inventory::start_batch))
        .route(
            "/inventory/smart-batch/:id/finish",
            post(inventory::finish_batch),
        )
        .with_permission(perm::BATCHES_MANAGE);

    let menu_read = Router::new()
        .route("/menu", get(menu::list_menu))
        .route("/menu/:id", get(menu::get_menu_item))
        .with_permission(perm::MENU_READ);

    let menu_manage = Router::new()
        .route("/menu", post(menu::create_menu_item))
        .route(
            "/menu/:id",
            put(menu::update_menu_item).delete(menu::delete_menu_item),
        )
        .with_permission(perm::MENU_MANAGE);

    let recipes_read = Router::new()
        .route("/recipes", get(recipes::get_recipe))
        .with_permission(perm::RECIPES_READ);

    let recipes_manage = Router::new()
        .route("/recipes", post(recipes::add_recipe_item))
        .route(
            "/recipes/:id",
            put(recipes::update_recipe_item).delete(recipes::delete_recipe_item),
        )
        .with_permission(perm::RECIPES_MANAGE);

    let customers_read = Router::new()
        .route("/customers", get(customers::list_customers))
        .route("/customers/:id", get(customers::get_customer))
        .with_permission(perm::CUSTOMERS_READ);

    let customers_manage = Router::new()
        .route("/customers", post(customers::create_customer))
        .route(
            "/customers/:id",
            put(customers::update_customer).delete(customers::delete_customer),
        )
        .with_permission(perm::CUSTOMERS_MANAGE);

    let payments_read = Router::new()
        .route("/payments", get(payments::list_payments))
        .with_permission(perm::PAYMENTS_READ);

    let payments_create = Router::new()
        .route("/payments", post(payments::record_payment))
        .with_permission(perm::PAYMENTS_CREATE);

    let reports_read = Router::new()
        .route("/reports", get(reports::sales_report))
        .with_permission(perm::REPORTS_READ);

    let users_read = Router::new()
        .route("/users", get(users::list_users))
        .with_permission(perm::USERS_READ);

    let users_manage = Router::new()
        .route("/users", post(users::create_user))
        .route("/users/:id", delete(users::delete_user))
        .with_permission(perm::USERS_MANAGE);

    let session = Router::new()
        .route("/auth/me", get(auth_h::me))
        .with_auth();

    Router::new()
        // Public
        .route("/status", get(api_status))
        .route("/auth/login", post(auth_h::login))
        .merge(session)
        // Orders and kitchen
        .merge(orders_read)
        .merge(orders_create)
        .merge(orders_update)
        .merge(kitchen_read)
        // Inventory and smart batches
        .merge(inventory_read)
        .merge(inventory_adjust)
        .merge(inventory_manage)
        .merge(batches_read)
        .merge(batches_manage)
        // Catalog
        .merge(menu_read)
        .merge(menu_manage)
        .merge(recipes_read)
        .merge(recipes_manage)
        // Front of house
        .merge(customers_read)
        .merge(customers_manage)
        .merge(payments_read)
        .merge(payments_create)
        // Back office
        .merge(reports_read)
        .merge(users_read)
        .merge(users_manage)
}

/// Health probes plus the versioned API, with the auth service and request
/// ids in place. Transport layers (CORS, compression, HTTP tracing) are added
/// by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/health", handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .layer(Extension(state.auth.clone()))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "service": "tesorito-pos",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "stock_policy": state.config.stock_policy.to_string(),
        "auto_deduct_inventory": state.config.auto_deduct_inventory,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}
