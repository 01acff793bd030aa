mod common;

use axum::http::Method;
use common::{dec, uuid_at, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tesorito_pos::entities::user::UserRole;

#[tokio::test]
async fn report_counts_only_completed_orders() {
    let app = TestApp::new().await;
    let taco = app.seed_menu_item("Taco", "20.00", "Tacos").await;
    let agua = app.seed_menu_item("Agua", "15.00", "Bebidas").await;

    // 3 x 20.00 = 60.00 -> 69.60
    let counter = app.place_order(&[(taco, 3)]).await;
    // 1 x 20.00 + 2 x 15.00 = 50.00 -> 58.00
    let table = app
        .place_order_with(json!({ "source": "Mesa" }), &[(taco, 1), (agua, 2)])
        .await;
    let open = app.place_order(&[(agua, 10)]).await;
    let cancelled = app.place_order(&[(taco, 10)]).await;

    app.set_status(uuid_at(&counter["id"]), "PAID").await;
    app.set_status(uuid_at(&table["id"]), "DELIVERED").await;
    app.set_status(uuid_at(&cancelled["id"]), "CANCELLED").await;
    assert_eq!(open["status"], "PENDING");

    let body = app.call(Method::GET, "/api/v1/reports", None, 200).await;
    let report = &body["data"];
    assert_eq!(report["days"], 7);

    let summary = &report["summary"];
    assert_eq!(summary["total_orders"], 2);
    assert_eq!(dec(&summary["total_sales"]), dec!(127.60));
    assert_eq!(dec(&summary["average_ticket"]), dec!(63.80));

    let by_source = &report["sales_by_source"];
    assert_eq!(by_source["Mostrador"]["count"], 1);
    assert_eq!(dec(&by_source["Mostrador"]["total"]), dec!(69.60));
    assert_eq!(dec(&by_source["Mesa"]["total"]), dec!(58.00));

    let days: Vec<Decimal> = report["sales_by_day"]
        .as_object()
        .unwrap()
        .values()
        .map(dec)
        .collect();
    assert_eq!(days.iter().copied().sum::<Decimal>(), dec!(127.60));

    let top = report["top_items"].as_array().unwrap();
    assert_eq!(top[0]["name"], "Taco");
    assert_eq!(top[0]["quantity"], 4);
    assert_eq!(dec(&top[0]["revenue"]), dec!(80.00));
    assert_eq!(top[1]["name"], "Agua");
    assert_eq!(top[1]["quantity"], 2);
}

#[tokio::test]
async fn report_includes_inventory_and_customer_snapshots() {
    let app = TestApp::new().await;
    app.call(
        Method::POST,
        "/api/v1/inventory",
        Some(json!({
            "name": "Queso",
            "unit": "kg",
            "current_stock": "2",
            "minimum_stock": "3",
            "cost_per_unit": "120.00",
        })),
        201,
    )
    .await;
    app.call(
        Method::POST,
        "/api/v1/inventory",
        Some(json!({
            "name": "Tortilla",
            "unit": "pz",
            "current_stock": "100",
            "minimum_stock": "10",
            "cost_per_unit": "0.50",
        })),
        201,
    )
    .await;
    app.call(
        Method::POST,
        "/api/v1/customers",
        Some(json!({ "name": "Lupita" })),
        201,
    )
    .await;

    let body = app
        .call(Method::GET, "/api/v1/reports?days=30", None, 200)
        .await;
    let report = &body["data"];
    assert_eq!(report["days"], 30);
    assert_eq!(report["summary"]["total_orders"], 0);
    assert_eq!(dec(&report["summary"]["average_ticket"]), Decimal::ZERO);

    let inventory = &report["inventory"];
    assert_eq!(inventory["low_stock_count"], 1);
    assert_eq!(inventory["low_stock_items"][0]["name"], "Queso");
    assert_eq!(dec(&inventory["total_stock_value"]), dec!(290.00));

    assert_eq!(report["customers"]["new_customers"], 1);
    assert_eq!(report["customers"]["top_customers"][0]["name"], "Lupita");
}

#[tokio::test]
async fn report_window_is_bounded() {
    let app = TestApp::new().await;

    app.call(Method::GET, "/api/v1/reports?days=0", None, 400)
        .await;
    app.call(Method::GET, "/api/v1/reports?days=367", None, 400)
        .await;
    app.call(Method::GET, "/api/v1/reports?days=366", None, 200)
        .await;
}

#[tokio::test]
async fn reports_are_for_managers() {
    let app = TestApp::new().await;
    let manager = app.token_for_role(UserRole::Manager).await;
    let chef = app.token_for_role(UserRole::Chef).await;

    let response = app
        .request(Method::GET, "/api/v1/reports", None, Some(&manager))
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(Method::GET, "/api/v1/reports", None, Some(&chef))
        .await;
    assert_eq!(response.status(), 403);
}
