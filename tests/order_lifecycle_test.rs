//! Order intake, totals, numbering and the status lifecycle.

mod common;

use axum::http::Method;
use common::{dec, response_json, uuid_at, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use tesorito_pos::entities::user::UserRole;

#[tokio::test]
async fn order_totals_apply_tax_to_the_priced_lines() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco al pastor", "25.50", "Tacos").await;
    let agua = app.seed_menu_item("Agua de horchata", "30.00", "Bebidas").await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "source": "Mesa",
                "table_label": "5",
                "items": [
                    { "menu_item_id": taco, "quantity": 2, "notes": "sin cebolla" },
                    { "menu_item_id": agua, "quantity": 1 },
                ],
            })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Order #001 created");

    let order = &body["data"];
    assert_eq!(order["order_number"], "001");
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["table_label"], "5");
    assert_eq!(dec(&order["subtotal"]), dec!(81.00));
    assert_eq!(dec(&order["tax"]), dec!(12.96));
    assert_eq!(dec(&order["total"]), dec!(93.96));

    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let taco_line = items
        .iter()
        .find(|l| l["menu_item_name"] == "Taco al pastor")
        .unwrap();
    assert_eq!(dec(&taco_line["unit_price"]), dec!(25.50));
    assert_eq!(dec(&taco_line["line_total"]), dec!(51.00));
    assert_eq!(taco_line["notes"], "sin cebolla");
}

#[tokio::test]
async fn order_numbers_are_sequential_and_searchable() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;

    let first = app.place_order(&[(taco, 1)]).await;
    let second = app.place_order(&[(taco, 1)]).await;
    assert_eq!(first["order_number"], "001");
    assert_eq!(second["order_number"], "002");

    let found = app
        .call(Method::GET, "/api/v1/orders/by-number/002", None, 200)
        .await;
    assert_eq!(found["data"]["id"], second["id"]);

    app.call(Method::GET, "/api/v1/orders/by-number/999", None, 404)
        .await;
}

#[tokio::test]
async fn price_changes_do_not_touch_existing_orders() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;
    let order = app.place_order(&[(taco, 2)]).await;

    app.call(
        Method::PUT,
        &format!("/api/v1/menu/{}", taco),
        Some(json!({ "price": "35.00" })),
        200,
    )
    .await;

    let fetched = app
        .call(Method::GET, &format!("/api/v1/orders/{}", order["id"].as_str().unwrap()), None, 200)
        .await;
    assert_eq!(dec(&fetched["data"]["subtotal"]), dec!(40.00));
    assert_eq!(dec(&fetched["data"]["items"][0]["unit_price"]), dec!(20.00));
}

#[tokio::test]
async fn adding_items_recomputes_totals() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;
    let agua = app.seed_menu_item("Agua", "15.00", "Bebidas").await;
    let order = app.place_order(&[(taco, 1)]).await;
    let order_id = uuid_at(&order["id"]);

    let body = app
        .call(
            Method::PATCH,
            &format!("/api/v1/orders/{}/items", order_id),
            Some(json!({ "items": [{ "menu_item_id": agua, "quantity": 2 }] })),
            200,
        )
        .await;
    let updated = &body["data"];
    assert_eq!(updated["items"].as_array().unwrap().len(), 2);
    assert_eq!(dec(&updated["subtotal"]), dec!(50.00));
    assert_eq!(dec(&updated["tax"]), dec!(8.00));
    assert_eq!(dec(&updated["total"]), dec!(58.00));

    // closed tickets cannot grow
    app.set_status(order_id, "PAID").await;
    app.call(
        Method::PATCH,
        &format!("/api/v1/orders/{}/items", order_id),
        Some(json!({ "items": [{ "menu_item_id": agua, "quantity": 1 }] })),
        400,
    )
    .await;
}

#[tokio::test]
async fn delivered_orders_take_no_new_items_once_stock_is_taken() {
    let app = TestApp::new().await;
    let queso = app.seed_ingredient("Queso", "kg", "5", "1").await;
    let quesadilla = app.seed_menu_item("Quesadilla", "50.00", "Antojitos").await;
    app.seed_recipe_line(quesadilla, queso, "1").await;

    let order = app.place_order(&[(quesadilla, 1)]).await;
    let order_id = uuid_at(&order["id"]);
    let delivered = app.set_status(order_id, "DELIVERED").await;
    assert!(!delivered["order"]["inventory_deducted_at"].is_null());
    assert_eq!(app.ingredient_stock(queso).await, dec!(4));

    let refused = app
        .call(
            Method::PATCH,
            &format!("/api/v1/orders/{}/items", order_id),
            Some(json!({ "items": [{ "menu_item_id": quesadilla, "quantity": 2 }] })),
            400,
        )
        .await;
    assert!(refused["message"]
        .as_str()
        .unwrap()
        .contains("inventory already deducted"));

    let fetched = app
        .call(Method::GET, &format!("/api/v1/orders/{}", order_id), None, 200)
        .await;
    assert_eq!(fetched["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(dec(&fetched["data"]["subtotal"]), dec!(50.00));
    assert_eq!(app.ingredient_stock(queso).await, dec!(4));
}

#[tokio::test]
async fn delivered_orders_without_a_deduction_still_grow() {
    let app = TestApp::with_config(|cfg| cfg.auto_deduct_inventory = false).await;
    let queso = app.seed_ingredient("Queso", "kg", "5", "1").await;
    let quesadilla = app.seed_menu_item("Quesadilla", "50.00", "Antojitos").await;
    app.seed_recipe_line(quesadilla, queso, "1").await;

    let order = app.place_order(&[(quesadilla, 1)]).await;
    let order_id = uuid_at(&order["id"]);
    app.set_status(order_id, "DELIVERED").await;
    app.call(
        Method::PATCH,
        &format!("/api/v1/orders/{}/items", order_id),
        Some(json!({ "items": [{ "menu_item_id": quesadilla, "quantity": 2 }] })),
        200,
    )
    .await;

    // every line sold is deducted once stock is finally taken
    app.call(
        Method::POST,
        "/api/v1/inventory/deduct",
        Some(json!({ "order_id": order_id })),
        200,
    )
    .await;
    assert_eq!(app.ingredient_stock(queso).await, dec!(2));
}

#[tokio::test]
async fn invalid_orders_are_rejected() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;

    // no lines
    app.call(
        Method::POST,
        "/api/v1/orders",
        Some(json!({ "source": "Mostrador", "items": [] })),
        400,
    )
    .await;
    // zero quantity
    app.call(
        Method::POST,
        "/api/v1/orders",
        Some(json!({ "source": "Mostrador", "items": [{ "menu_item_id": taco, "quantity": 0 }] })),
        400,
    )
    .await;
    // unknown menu item
    app.call(
        Method::POST,
        "/api/v1/orders",
        Some(json!({
            "source": "Mostrador",
            "items": [{ "menu_item_id": uuid::Uuid::new_v4(), "quantity": 1 }],
        })),
        404,
    )
    .await;

    // switched-off menu item
    app.call(
        Method::PUT,
        &format!("/api/v1/menu/{}", taco),
        Some(json!({ "is_available": false })),
        200,
    )
    .await;
    app.call(
        Method::POST,
        "/api/v1/orders",
        Some(json!({ "source": "Mostrador", "items": [{ "menu_item_id": taco, "quantity": 1 }] })),
        400,
    )
    .await;
}

#[tokio::test]
async fn orders_walk_the_kitchen_lifecycle() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;
    let order = app.place_order(&[(taco, 1)]).await;
    let order_id = uuid_at(&order["id"]);

    for status in ["PREPARING", "READY", "DELIVERED"] {
        let change = app.set_status(order_id, status).await;
        assert_eq!(change["order"]["status"], status);
    }
    let delivered = app.set_status(order_id, "DELIVERED").await;
    assert!(!delivered["order"]["completed_at"].is_null());

    let listed = app
        .call(Method::GET, "/api/v1/orders?status=DELIVERED", None, 200)
        .await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    let pending = app
        .call(Method::GET, "/api/v1/orders?status=PENDING,PREPARING", None, 200)
        .await;
    assert!(pending["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_orders_are_frozen() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;
    let order = app.place_order(&[(taco, 1)]).await;
    let order_id = uuid_at(&order["id"]);

    app.set_status(order_id, "CANCELLED").await;
    app.call(
        Method::PATCH,
        &format!("/api/v1/orders/{}/status", order_id),
        Some(json!({ "status": "PREPARING" })),
        400,
    )
    .await;
}

#[tokio::test]
async fn unknown_status_is_a_bad_request() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;
    let order = app.place_order(&[(taco, 1)]).await;

    app.call(
        Method::PATCH,
        &format!("/api/v1/orders/{}/status", order["id"].as_str().unwrap()),
        Some(json!({ "status": "EATEN" })),
        400,
    )
    .await;
}

#[tokio::test]
async fn customer_orders_earn_loyalty_points() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "25.50", "Tacos").await;
    let customer = app
        .call(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "name": "Lupita", "phone": "+52 55 1234 5678" })),
            201,
        )
        .await;
    let customer_id = customer["data"]["id"].clone();

    // 4 x 25.50 = 102.00, plus 16% tax = 118.32
    let order = app
        .place_order_with(
            json!({ "source": "Mostrador", "customer_id": customer_id }),
            &[(taco, 4)],
        )
        .await;
    assert_eq!(dec(&order["total"]), dec!(118.32));
    assert_eq!(order["customer"]["name"], "Lupita");

    let fetched = app
        .call(
            Method::GET,
            &format!("/api/v1/customers/{}", customer_id.as_str().unwrap()),
            None,
            200,
        )
        .await;
    assert_eq!(fetched["data"]["loyalty_points"], 11);
    assert_eq!(dec(&fetched["data"]["total_spend"]), dec!(118.32));
}

#[tokio::test]
async fn loyalty_points_stop_at_the_column_limit() {
    let app = TestApp::new().await;
    let banquete = app
        .seed_menu_item("Banquete", "100000000.00", "Eventos")
        .await;
    let customer = app
        .call(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "name": "Don Chuy" })),
            201,
        )
        .await;
    let customer_id = customer["data"]["id"].clone();

    for _ in 0..2 {
        app.place_order_with(
            json!({ "source": "Eventos", "customer_id": customer_id }),
            &[(banquete, 999)],
        )
        .await;
    }

    let fetched = app
        .call(
            Method::GET,
            &format!("/api/v1/customers/{}", customer_id.as_str().unwrap()),
            None,
            200,
        )
        .await;
    assert_eq!(fetched["data"]["loyalty_points"], i64::from(i32::MAX));
    assert!(dec(&fetched["data"]["total_spend"]) > dec!(200000000000));
}

#[tokio::test]
async fn repeat_customers_accumulate_points_and_spend() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "25.00", "Tacos").await;
    let customer = app
        .call(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "name": "Lupita" })),
            201,
        )
        .await;
    let customer_id = customer["data"]["id"].clone();

    // 2 x 25.00 = 50.00 -> 58.00 each, 5 points each
    for _ in 0..3 {
        app.place_order_with(
            json!({ "source": "Mostrador", "customer_id": customer_id }),
            &[(taco, 2)],
        )
        .await;
    }

    let fetched = app
        .call(
            Method::GET,
            &format!("/api/v1/customers/{}", customer_id.as_str().unwrap()),
            None,
            200,
        )
        .await;
    assert_eq!(fetched["data"]["loyalty_points"], 15);
    assert_eq!(dec(&fetched["data"]["total_spend"]), dec!(174.00));
}

#[tokio::test]
async fn chefs_can_move_orders_but_not_take_them() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;
    let order = app.place_order(&[(taco, 1)]).await;
    let chef = app.token_for_role(UserRole::Chef).await;

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/orders/{}/status", order["id"].as_str().unwrap()),
            Some(json!({ "status": "PREPARING" })),
            Some(&chef),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "source": "Mostrador", "items": [{ "menu_item_id": taco, "quantity": 1 }] })),
            Some(&chef),
        )
        .await;
    assert_eq!(response.status(), 403);
}
