mod common;

use axum::http::Method;
use chrono::{DateTime, Utc};
use common::{uuid_at, TestApp};
use serde_json::{json, Value};
use tesorito_pos::entities::user::UserRole;

#[tokio::test]
async fn finishing_a_batch_counts_units_made_with_the_ingredient() {
    let app = TestApp::new().await;
    let salsa = app.seed_ingredient("Salsa verde", "l", "4", "1").await;
    let tortilla = app.seed_ingredient("Tortilla", "pz", "200", "20").await;
    let chilaquiles = app.seed_menu_item("Chilaquiles", "95.00", "Desayunos").await;
    let enchiladas = app.seed_menu_item("Enchiladas", "110.00", "Comida").await;
    let quesadilla = app.seed_menu_item("Quesadilla", "45.00", "Antojitos").await;
    app.seed_recipe_line(chilaquiles, salsa, "0.2").await;
    app.seed_recipe_line(enchiladas, salsa, "0.15").await;
    app.seed_recipe_line(quesadilla, tortilla, "1").await;

    let started = app
        .call(
            Method::POST,
            "/api/v1/inventory/smart-batch",
            Some(json!({ "ingredient_id": salsa })),
            201,
        )
        .await;
    let batch_id = uuid_at(&started["data"]["id"]);
    assert_eq!(started["data"]["name"], "Topper Standard");
    assert_eq!(started["data"]["is_active"], true);

    let active = app
        .call(
            Method::GET,
            &format!("/api/v1/inventory/smart-batch?ingredient_id={}", salsa),
            None,
            200,
        )
        .await;
    assert_eq!(uuid_at(&active["data"]["id"]), batch_id);

    app.place_order(&[(chilaquiles, 2), (quesadilla, 4)]).await;
    app.place_order(&[(enchiladas, 1), (chilaquiles, 1)]).await;
    let cancelled = app.place_order(&[(enchiladas, 5)]).await;
    app.set_status(uuid_at(&cancelled["id"]), "CANCELLED").await;

    let finished = app
        .call(
            Method::POST,
            &format!("/api/v1/inventory/smart-batch/{}/finish", batch_id),
            None,
            200,
        )
        .await;
    let batch_yield = &finished["data"];
    assert_eq!(
        batch_yield["summary"],
        json!({ "Chilaquiles": 3, "Enchiladas": 1 })
    );
    assert_eq!(batch_yield["total_items"], 4);
    assert_eq!(batch_yield["batch"]["is_active"], false);
    assert!(!batch_yield["batch"]["ended_at"].is_null());
    assert_eq!(batch_yield["batch"]["final_yield"], batch_yield["summary"]);

    let active = app
        .call(
            Method::GET,
            &format!("/api/v1/inventory/smart-batch?ingredient_id={}", salsa),
            None,
            200,
        )
        .await;
    assert!(active["data"].is_null());

    let history = app
        .call(
            Method::GET,
            &format!("/api/v1/inventory/smart-batch/history?ingredient_id={}", salsa),
            None,
            200,
        )
        .await;
    assert_eq!(history["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn starting_a_new_batch_closes_the_open_one() {
    let app = TestApp::new().await;
    let salsa = app.seed_ingredient("Salsa roja", "l", "4", "1").await;

    let first = app
        .call(
            Method::POST,
            "/api/v1/inventory/smart-batch",
            Some(json!({ "ingredient_id": salsa, "name": "Lote lunes" })),
            201,
        )
        .await;
    let second = app
        .call(
            Method::POST,
            "/api/v1/inventory/smart-batch",
            Some(json!({ "ingredient_id": salsa, "name": "Lote martes" })),
            201,
        )
        .await;
    assert_eq!(second["data"]["name"], "Lote martes");

    let active = app
        .call(
            Method::GET,
            &format!("/api/v1/inventory/smart-batch?ingredient_id={}", salsa),
            None,
            200,
        )
        .await;
    assert_eq!(active["data"]["id"], second["data"]["id"]);

    let history = app
        .call(
            Method::GET,
            &format!("/api/v1/inventory/smart-batch/history?ingredient_id={}", salsa),
            None,
            200,
        )
        .await;
    let batches = history["data"].as_array().unwrap();
    assert_eq!(batches.len(), 2);
    let closed = batches
        .iter()
        .find(|b| b["id"] == first["data"]["id"])
        .unwrap();
    let open = batches
        .iter()
        .find(|b| b["id"] == second["data"]["id"])
        .unwrap();
    assert_eq!(closed["is_active"], false);
    assert_eq!(open["is_active"], true);
    assert!(open["ended_at"].is_null());
    let ended_at = timestamp(&closed["ended_at"]);
    assert!(ended_at <= timestamp(&open["started_at"]));
    assert!(ended_at >= timestamp(&closed["started_at"]));

    app.call(
        Method::POST,
        &format!("/api/v1/inventory/smart-batch/{}/finish", first["data"]["id"].as_str().unwrap()),
        None,
        400,
    )
    .await;
}

fn timestamp(value: &Value) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value.as_str().expect("timestamp string"))
        .expect("RFC 3339 timestamp")
        .with_timezone(&Utc)
}

#[tokio::test]
async fn batch_operations_reject_unknown_ids() {
    let app = TestApp::new().await;

    app.call(
        Method::POST,
        "/api/v1/inventory/smart-batch",
        Some(json!({ "ingredient_id": uuid::Uuid::new_v4() })),
        404,
    )
    .await;
    app.call(
        Method::POST,
        &format!("/api/v1/inventory/smart-batch/{}/finish", uuid::Uuid::new_v4()),
        None,
        404,
    )
    .await;
}

#[tokio::test]
async fn chefs_run_batches() {
    let app = TestApp::new().await;
    let salsa = app.seed_ingredient("Salsa verde", "l", "4", "1").await;
    let chef = app.token_for_role(UserRole::Chef).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/inventory/smart-batch",
            Some(json!({ "ingredient_id": salsa })),
            Some(&chef),
        )
        .await;
    assert_eq!(response.status(), 201);
}
