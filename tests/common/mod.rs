#![allow(dead_code)]

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::{str::FromStr, sync::Arc};
use tempfile::TempDir;
use tesorito_pos::{
    config::AppConfig,
    db,
    entities::user::UserRole,
    events::{self, EventSender},
    services::users::CreateUserInput,
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

const TEST_JWT_SECRET: &str =
    "test-secret-key-for-the-integration-suite-that-is-long-enough-0123456789";

/// Application router over a throwaway SQLite file, signed in as an administrator.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after letting the caller tweak the configuration,
    /// e.g. to switch the stock policy or disable automatic deduction.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("pos.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.default_tax_rate = 0.16;
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));
        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));

        let admin = state
            .services
            .users
            .ensure_admin("admin@tesorito.test", "admin-password")
            .await
            .expect("bootstrap admin")
            .expect("user table starts empty");
        let token = state
            .auth
            .issue_token(&admin)
            .expect("admin token")
            .access_token;

        let router = tesorito_pos::app(state.clone());

        Self {
            router,
            state,
            token,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Creates a staff member with `role` and returns a bearer token for them.
    pub async fn token_for_role(&self, role: UserRole) -> String {
        let user = self
            .state
            .services
            .users
            .create(CreateUserInput {
                email: format!("{}-{}@tesorito.test", role, Uuid::new_v4().simple()).to_lowercase(),
                name: format!("Test {}", role),
                role,
                password: "staff-password".to_string(),
            })
            .await
            .expect("create staff user");
        self.state
            .auth
            .issue_token(&user)
            .expect("staff token")
            .access_token
    }

    /// Sends a request with an optional JSON body and bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Authenticated request that must answer `expected`; returns the JSON body.
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>, expected: u16) -> Value {
        let response = self.request_authenticated(method.clone(), uri, body).await;
        let status = response.status().as_u16();
        let json = response_json(response).await;
        assert_eq!(status, expected, "{} {} answered {}: {}", method, uri, status, json);
        json
    }

    pub async fn seed_ingredient(&self, name: &str, unit: &str, stock: &str, minimum: &str) -> Uuid {
        let body = self
            .call(
                Method::POST,
                "/api/v1/inventory",
                Some(json!({
                    "name": name,
                    "unit": unit,
                    "current_stock": stock,
                    "minimum_stock": minimum,
                })),
                201,
            )
            .await;
        uuid_at(&body["data"]["id"])
    }

    pub async fn seed_menu_item(&self, name: &str, price: &str, category: &str) -> Uuid {
        let body = self
            .call(
                Method::POST,
                "/api/v1/menu",
                Some(json!({
                    "name": name,
                    "price": price,
                    "category": category,
                })),
                201,
            )
            .await;
        uuid_at(&body["data"]["id"])
    }

    pub async fn seed_recipe_line(&self, menu_item_id: Uuid, ingredient_id: Uuid, quantity: &str) -> Uuid {
        let body = self
            .call(
                Method::POST,
                "/api/v1/recipes",
                Some(json!({
                    "menu_item_id": menu_item_id,
                    "ingredient_id": ingredient_id,
                    "quantity_required": quantity,
                })),
                201,
            )
            .await;
        uuid_at(&body["data"]["id"])
    }

    /// Places a counter order and returns the created order document.
    pub async fn place_order(&self, lines: &[(Uuid, i32)]) -> Value {
        self.place_order_with(json!({ "source": "Mostrador" }), lines).await
    }

    /// Places an order with extra top-level fields (customer, table...).
    pub async fn place_order_with(&self, mut fields: Value, lines: &[(Uuid, i32)]) -> Value {
        let items: Vec<Value> = lines
            .iter()
            .map(|(menu_item_id, quantity)| json!({ "menu_item_id": menu_item_id, "quantity": quantity }))
            .collect();
        fields["items"] = Value::Array(items);
        let body = self
            .call(Method::POST, "/api/v1/orders", Some(fields), 201)
            .await;
        body["data"].clone()
    }

    pub async fn set_status(&self, order_id: Uuid, status: &str) -> Value {
        let body = self
            .call(
                Method::PATCH,
                &format!("/api/v1/orders/{}/status", order_id),
                Some(json!({ "status": status })),
                200,
            )
            .await;
        body["data"].clone()
    }

    pub async fn ingredient_stock(&self, ingredient_id: Uuid) -> Decimal {
        let body = self.call(Method::GET, "/api/v1/inventory", None, 200).await;
        let ingredient = body["data"]
            .as_array()
            .expect("inventory list")
            .iter()
            .find(|i| i["id"] == json!(ingredient_id))
            .expect("ingredient listed")
            .clone();
        dec(&ingredient["current_stock"])
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json response")
}

/// Reads a decimal that may be serialized as a string or a number.
pub fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a decimal, got {}", other),
    }
}

pub fn uuid_at(value: &Value) -> Uuid {
    Uuid::parse_str(value.as_str().expect("uuid string")).expect("valid uuid")
}
