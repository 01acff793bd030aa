//! Menu items and the recipes that tie them to ingredients.

mod common;

use axum::http::Method;
use common::{dec, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use tesorito_pos::entities::user::UserRole;

#[tokio::test]
async fn menu_can_be_filtered_by_category_and_availability() {
    let app = TestApp::new().await;
    app.seed_menu_item("Taco", "20.00", "Tacos").await;
    let gringa = app.seed_menu_item("Gringa", "55.00", "Tacos").await;
    app.seed_menu_item("Horchata", "30.00", "Bebidas").await;

    app.call(
        Method::PUT,
        &format!("/api/v1/menu/{}", gringa),
        Some(json!({ "is_available": false })),
        200,
    )
    .await;

    let names = |body: &serde_json::Value| -> Vec<String> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["name"].as_str().unwrap().to_string())
            .collect()
    };

    let all = app.call(Method::GET, "/api/v1/menu", None, 200).await;
    assert_eq!(names(&all), vec!["Gringa", "Horchata", "Taco"]);

    let tacos = app
        .call(Method::GET, "/api/v1/menu?category=Tacos", None, 200)
        .await;
    assert_eq!(names(&tacos), vec!["Gringa", "Taco"]);

    let available = app
        .call(Method::GET, "/api/v1/menu?category=Tacos&available=true", None, 200)
        .await;
    assert_eq!(names(&available), vec!["Taco"]);
}

#[tokio::test]
async fn menu_items_validate_price_and_image() {
    let app = TestApp::new().await;

    app.call(
        Method::POST,
        "/api/v1/menu",
        Some(json!({ "name": "Taco", "price": "-1" })),
        400,
    )
    .await;
    app.call(
        Method::POST,
        "/api/v1/menu",
        Some(json!({ "name": "Taco", "price": "20", "image_url": "not a url" })),
        400,
    )
    .await;
    app.call(Method::GET, &format!("/api/v1/menu/{}", uuid::Uuid::new_v4()), None, 404)
        .await;
}

#[tokio::test]
async fn sold_menu_items_cannot_be_deleted() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;
    let special = app.seed_menu_item("Especial del dia", "80.00", "Comida").await;
    app.place_order(&[(taco, 1)]).await;

    let conflict = app
        .call(Method::DELETE, &format!("/api/v1/menu/{}", taco), None, 409)
        .await;
    assert!(conflict["message"]
        .as_str()
        .unwrap()
        .contains("mark it unavailable"));

    app.call(Method::DELETE, &format!("/api/v1/menu/{}", special), None, 204)
        .await;
    app.call(Method::GET, &format!("/api/v1/menu/{}", special), None, 404)
        .await;
}

#[tokio::test]
async fn recipe_lines_can_be_added_changed_and_removed() {
    let app = TestApp::new().await;
    let queso = app.seed_ingredient("Queso", "kg", "5", "1").await;
    let tortilla = app.seed_ingredient("Tortilla", "pz", "100", "20").await;
    let quesadilla = app.seed_menu_item("Quesadilla", "45.00", "Antojitos").await;

    let queso_line = app.seed_recipe_line(quesadilla, queso, "0.150").await;
    let tortilla_line = app.seed_recipe_line(quesadilla, tortilla, "1").await;

    let recipe = app
        .call(
            Method::GET,
            &format!("/api/v1/recipes?menu_item_id={}", quesadilla),
            None,
            200,
        )
        .await;
    let lines = recipe["data"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["ingredient"]["name"], "Queso");
    assert_eq!(dec(&lines[0]["quantity_required"]), dec!(0.15));

    let updated = app
        .call(
            Method::PUT,
            &format!("/api/v1/recipes/{}", queso_line),
            Some(json!({ "quantity_required": "0.2" })),
            200,
        )
        .await;
    assert_eq!(dec(&updated["data"]["quantity_required"]), dec!(0.2));

    app.call(
        Method::DELETE,
        &format!("/api/v1/recipes/{}", tortilla_line),
        None,
        204,
    )
    .await;
    let recipe = app
        .call(
            Method::GET,
            &format!("/api/v1/recipes?menu_item_id={}", quesadilla),
            None,
            200,
        )
        .await;
    assert_eq!(recipe["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn recipe_lines_need_positive_quantities_and_known_rows() {
    let app = TestApp::new().await;
    let queso = app.seed_ingredient("Queso", "kg", "5", "1").await;
    let quesadilla = app.seed_menu_item("Quesadilla", "45.00", "Antojitos").await;

    app.call(
        Method::POST,
        "/api/v1/recipes",
        Some(json!({ "menu_item_id": quesadilla, "ingredient_id": queso, "quantity_required": "0" })),
        400,
    )
    .await;
    app.call(
        Method::POST,
        "/api/v1/recipes",
        Some(json!({
            "menu_item_id": quesadilla,
            "ingredient_id": uuid::Uuid::new_v4(),
            "quantity_required": "1",
        })),
        404,
    )
    .await;
    app.call(
        Method::DELETE,
        &format!("/api/v1/recipes/{}", uuid::Uuid::new_v4()),
        None,
        404,
    )
    .await;
}

#[tokio::test]
async fn waiters_read_the_menu_but_cannot_edit_it() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;
    let waiter = app.token_for_role(UserRole::Waiter).await;

    let response = app
        .request(Method::GET, "/api/v1/menu", None, Some(&waiter))
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/menu/{}", taco),
            Some(json!({ "price": "1.00" })),
            Some(&waiter),
        )
        .await;
    assert_eq!(response.status(), 403);
}
