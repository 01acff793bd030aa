mod common;

use axum::http::Method;
use common::{dec, TestApp};
use rust_decimal::Decimal;
use serde_json::json;

#[tokio::test]
async fn customer_crud_round() {
    let app = TestApp::new().await;

    let created = app
        .call(
            Method::POST,
            "/api/v1/customers",
            Some(json!({
                "name": "  Ana Torres ",
                "phone": "+52 55 1234 5678",
                "email": "Ana@Example.com",
                "birthday": "1990-04-21T00:00:00Z",
            })),
            201,
        )
        .await;
    let customer = &created["data"];
    let id = customer["id"].as_str().unwrap().to_string();
    assert_eq!(customer["name"], "Ana Torres");
    assert_eq!(customer["email"], "ana@example.com");
    assert_eq!(customer["birthday"], "1990-04-21");
    assert_eq!(customer["loyalty_points"], 0);
    assert_eq!(dec(&customer["total_spend"]), Decimal::ZERO);

    let updated = app
        .call(
            Method::PUT,
            &format!("/api/v1/customers/{}", id),
            Some(json!({ "phone": "55 8765 4321" })),
            200,
        )
        .await;
    assert_eq!(updated["data"]["phone"], "55 8765 4321");
    // untouched fields stay
    assert_eq!(updated["data"]["email"], "ana@example.com");

    let listed = app.call(Method::GET, "/api/v1/customers", None, 200).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    app.call(Method::DELETE, &format!("/api/v1/customers/{}", id), None, 204)
        .await;
    app.call(Method::GET, &format!("/api/v1/customers/{}", id), None, 404)
        .await;
}

#[tokio::test]
async fn customer_contact_details_are_validated() {
    let app = TestApp::new().await;

    for payload in [
        json!({ "phone": "55 1234 5678" }),
        json!({ "name": "   " }),
        json!({ "name": "Ana", "email": "ana-at-example" }),
        json!({ "name": "Ana", "phone": "call me" }),
        json!({ "name": "Ana", "birthday": "21/04/1990" }),
    ] {
        app.call(Method::POST, "/api/v1/customers", Some(payload), 400)
            .await;
    }

    let listed = app.call(Method::GET, "/api/v1/customers", None, 200).await;
    assert!(listed["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn orders_for_unknown_customers_are_rejected() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;

    app.call(
        Method::POST,
        "/api/v1/orders",
        Some(json!({
            "source": "Mostrador",
            "customer_id": uuid::Uuid::new_v4(),
            "items": [{ "menu_item_id": taco, "quantity": 1 }],
        })),
        404,
    )
    .await;
}
