mod common;

use axum::http::Method;
use common::{dec, uuid_at, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use tesorito_pos::entities::user::UserRole;

#[tokio::test]
async fn manual_adjustment_moves_stock_and_is_logged() {
    let app = TestApp::new().await;
    let aguacate = app.seed_ingredient("Aguacate", "kg", "2", "1").await;

    let body = app
        .call(
            Method::PATCH,
            "/api/v1/inventory/adjust",
            Some(json!({
                "ingredient_id": aguacate,
                "adjustment": "3.5",
                "reason": "Entrega del proveedor",
            })),
            200,
        )
        .await;
    let result = &body["data"];
    assert_eq!(dec(&result["previous_stock"]), dec!(2));
    assert_eq!(dec(&result["new_stock"]), dec!(5.5));
    assert_eq!(result["adjustment"]["reason"], "Entrega del proveedor");
    assert!(result["adjustment"]["order_id"].is_null());
    // the acting user is recorded
    assert!(!result["adjustment"]["user_id"].is_null());

    app.call(
        Method::PATCH,
        "/api/v1/inventory/adjust",
        Some(json!({ "ingredient_id": aguacate, "adjustment": "-0.5", "reason": "Merma" })),
        200,
    )
    .await;
    assert_eq!(app.ingredient_stock(aguacate).await, dec!(5));

    let history = app
        .call(Method::GET, &format!("/api/v1/inventory/{}/history", aguacate), None, 200)
        .await;
    let movements = history["data"].as_array().unwrap();
    assert_eq!(movements.len(), 2);
    // newest first
    assert_eq!(movements[0]["reason"], "Merma");
    assert_eq!(dec(&movements[0]["adjustment"]), dec!(-0.5));
}

#[tokio::test]
async fn zero_and_unknown_adjustments_are_rejected() {
    let app = TestApp::new().await;
    let aguacate = app.seed_ingredient("Aguacate", "kg", "2", "1").await;

    app.call(
        Method::PATCH,
        "/api/v1/inventory/adjust",
        Some(json!({ "ingredient_id": aguacate, "adjustment": "0" })),
        400,
    )
    .await;
    app.call(
        Method::PATCH,
        "/api/v1/inventory/adjust",
        Some(json!({ "ingredient_id": uuid::Uuid::new_v4(), "adjustment": "1" })),
        404,
    )
    .await;

    assert_eq!(app.ingredient_stock(aguacate).await, dec!(2));
}

#[tokio::test]
async fn low_stock_lists_ingredients_at_or_below_minimum() {
    let app = TestApp::new().await;
    let cebolla = app.seed_ingredient("Cebolla", "kg", "3", "1").await;
    let limon = app.seed_ingredient("Limon", "kg", "1", "1").await;
    app.seed_ingredient("Cilantro", "manojo", "0.5", "2").await;

    let body = app
        .call(Method::GET, "/api/v1/inventory/low-stock", None, 200)
        .await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    // lowest stock first; equal to the minimum counts as low
    assert_eq!(names, vec!["Cilantro", "Limon"]);

    // dropping Cebolla to its minimum puts it on the list
    app.call(
        Method::PATCH,
        "/api/v1/inventory/adjust",
        Some(json!({ "ingredient_id": cebolla, "adjustment": "-2" })),
        200,
    )
    .await;
    let body = app
        .call(Method::GET, "/api/v1/inventory?low_stock=true", None, 200)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let listing = app.call(Method::GET, "/api/v1/inventory", None, 200).await;
    let limon_entry = listing["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| uuid_at(&i["id"]) == limon)
        .unwrap()
        .clone();
    assert_eq!(limon_entry["is_low_stock"], true);
}

#[tokio::test]
async fn ingredient_update_leaves_stock_untouched() {
    let app = TestApp::new().await;
    let cebolla = app.seed_ingredient("Cebolla", "kg", "3", "1").await;

    let body = app
        .call(
            Method::PUT,
            &format!("/api/v1/inventory/{}", cebolla),
            Some(json!({ "name": "Cebolla blanca", "minimum_stock": "4" })),
            200,
        )
        .await;
    assert_eq!(body["data"]["name"], "Cebolla blanca");
    assert_eq!(dec(&body["data"]["current_stock"]), dec!(3));
    assert_eq!(dec(&body["data"]["minimum_stock"]), dec!(4));
}

#[tokio::test]
async fn kitchen_scale_quantities_keep_their_digits() {
    let app = TestApp::new().await;
    let harina = app.seed_ingredient("Harina", "kg", "12345.678", "0.001").await;

    let body = app
        .call(
            Method::PATCH,
            "/api/v1/inventory/adjust",
            Some(json!({ "ingredient_id": harina, "adjustment": "-0.125" })),
            200,
        )
        .await;
    assert_eq!(dec(&body["data"]["previous_stock"]), dec!(12345.678));
    assert_eq!(dec(&body["data"]["new_stock"]), dec!(12345.553));
    assert_eq!(app.ingredient_stock(harina).await, dec!(12345.553));
}

#[tokio::test]
async fn creating_ingredients_validates_input() {
    let app = TestApp::new().await;

    app.call(
        Method::POST,
        "/api/v1/inventory",
        Some(json!({ "name": "", "unit": "kg" })),
        400,
    )
    .await;
    app.call(
        Method::POST,
        "/api/v1/inventory",
        Some(json!({ "name": "Sal", "unit": "kg", "current_stock": "-1" })),
        400,
    )
    .await;
}

#[tokio::test]
async fn waiters_cannot_touch_inventory() {
    let app = TestApp::new().await;
    let aguacate = app.seed_ingredient("Aguacate", "kg", "2", "1").await;
    let waiter = app.token_for_role(UserRole::Waiter).await;

    let response = app
        .request(
            Method::PATCH,
            "/api/v1/inventory/adjust",
            Some(json!({ "ingredient_id": aguacate, "adjustment": "1" })),
            Some(&waiter),
        )
        .await;
    assert_eq!(response.status(), 403);
    assert_eq!(app.ingredient_stock(aguacate).await, dec!(2));
}
