//! 库存、出库与分录集成测试

use axum::http::{header, StatusCode};
use axum::Router;
use erp_context::seed::{BRANCH_NY_ID, SUBSIDIARY_US_ID};
use serde_json::{json, Value};
use uuid::Uuid;

mod common;
use common::{create_test_app, get, login_token, post};

struct Cell {
    warehouse_id: Uuid,
    location_id: Uuid,
    product_id: Uuid,
}

impl Cell {
    fn new() -> Self {
        Self {
            warehouse_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
        }
    }

    fn adjustment(&self, delta: &str, unit_cost: Option<&str>) -> Value {
        json!({
            "warehouse_id": self.warehouse_id,
            "location_id": self.location_id,
            "product_id": self.product_id,
            "delta": delta,
            "unit_cost": unit_cost,
            "reference_type": "stock_count",
            "reference_id": Uuid::new_v4(),
        })
    }

    fn delivery(&self, reference: &str, quantity: &str, unit_cost: &str) -> Value {
        json!({
            "warehouse_id": self.warehouse_id,
            "reference": reference,
            "lines": [{
                "location_id": self.location_id,
                "product_id": self.product_id,
                "quantity": quantity,
                "unit_cost": unit_cost,
            }],
        })
    }
}

fn num(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.as_f64().unwrap(),
    }
}

async fn stock_quantity(app: &Router, token: &str, company_id: Uuid) -> Vec<f64> {
    let response = get(app, &format!("/api/companies/{}/stock", company_id), token).await;
    assert_eq!(response.status, StatusCode::OK);
    response.json()["stock"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| num(&c["quantity"]))
        .collect()
}

#[tokio::test]
async fn test_adjust_stock() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "clerk", None).await;
    let cell = Cell::new();

    let response = post(
        &app,
        &format!("/api/companies/{}/stock/adjust", BRANCH_NY_ID),
        &token,
        cell.adjustment("10", Some("2.50")),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let movement = response.json();
    assert_eq!(num(&movement["quantity_delta"]), 10.0);
    assert_eq!(num(&movement["resulting_quantity"]), 10.0);
    assert_eq!(movement["reference_type"], "stock_count");

    let response = post(
        &app,
        &format!("/api/companies/{}/stock/adjust", BRANCH_NY_ID),
        &token,
        cell.adjustment("-3", None),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(num(&response.json()["resulting_quantity"]), 7.0);

    assert_eq!(stock_quantity(&app, &token, BRANCH_NY_ID).await, vec![7.0]);

    let response = get(
        &app,
        &format!("/api/companies/{}/stock/movements", BRANCH_NY_ID),
        &token,
    )
    .await;
    assert_eq!(response.json()["count"], 2);
}

#[tokio::test]
async fn test_adjust_stock_cannot_go_negative() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "clerk", None).await;
    let cell = Cell::new();

    post(
        &app,
        &format!("/api/companies/{}/stock/adjust", BRANCH_NY_ID),
        &token,
        cell.adjustment("5", Some("1")),
    )
    .await;

    let response = post(
        &app,
        &format!("/api/companies/{}/stock/adjust", BRANCH_NY_ID),
        &token,
        cell.adjustment("-6", None),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = post(
        &app,
        &format!("/api/companies/{}/stock/adjust", BRANCH_NY_ID),
        &token,
        cell.adjustment("0", None),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(stock_quantity(&app, &token, BRANCH_NY_ID).await, vec![5.0]);
}

#[tokio::test]
async fn test_delivery_posts_balanced_journal_entry() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "clerk", None).await;
    let cell = Cell::new();
    let base = format!("/api/companies/{}", BRANCH_NY_ID);

    post(
        &app,
        &format!("{}/stock/adjust", base),
        &token,
        cell.adjustment("10", Some("2.50")),
    )
    .await;

    let response = post(
        &app,
        &format!("{}/deliveries", base),
        &token,
        cell.delivery("SO-1001", "4", "2.50"),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let delivery = response.json();
    assert_eq!(delivery["status"], "draft");
    let delivery_id = delivery["id"].as_str().unwrap().to_string();

    // 草稿不能直接完成
    let response = post(
        &app,
        &format!("{}/deliveries/{}/complete", base, delivery_id),
        &token,
        json!({}),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = post(
        &app,
        &format!("{}/deliveries/{}/ready", base, delivery_id),
        &token,
        json!({}),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "ready");

    let response = post(
        &app,
        &format!("{}/deliveries/{}/complete", base, delivery_id),
        &token,
        json!({}),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    let completion = response.json();
    assert_eq!(completion["delivery"]["status"], "done");
    assert!(completion["delivery"]["completed_at"].is_string());

    let movements = completion["movements"].as_array().unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(num(&movements[0]["quantity_delta"]), -4.0);
    assert_eq!(movements[0]["reference_id"], delivery_id.as_str());

    let entry = &completion["journal_entry"];
    let lines = entry["lines"].as_array().unwrap();
    let debit: f64 = lines.iter().map(|l| num(&l["debit"])).sum();
    let credit: f64 = lines.iter().map(|l| num(&l["credit"])).sum();
    assert_eq!(debit, 10.0);
    assert_eq!(debit, credit);

    assert_eq!(stock_quantity(&app, &token, BRANCH_NY_ID).await, vec![6.0]);

    let response = get(&app, &format!("{}/journal-entries", base), &token).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["count"], 1);

    // 已完成的出库单不能取消
    let response = post(
        &app,
        &format!("{}/deliveries/{}/cancel", base, delivery_id),
        &token,
        json!({}),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delivery_with_insufficient_stock_changes_nothing() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "clerk", None).await;
    let cell = Cell::new();
    let base = format!("/api/companies/{}", BRANCH_NY_ID);

    post(
        &app,
        &format!("{}/stock/adjust", base),
        &token,
        cell.adjustment("2", Some("1")),
    )
    .await;

    let delivery = post(
        &app,
        &format!("{}/deliveries", base),
        &token,
        cell.delivery("SO-1002", "3", "1"),
    )
    .await
    .json();
    let delivery_id = delivery["id"].as_str().unwrap();
    post(
        &app,
        &format!("{}/deliveries/{}/ready", base, delivery_id),
        &token,
        json!({}),
    )
    .await;

    let response = post(
        &app,
        &format!("{}/deliveries/{}/complete", base, delivery_id),
        &token,
        json!({}),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(stock_quantity(&app, &token, BRANCH_NY_ID).await, vec![2.0]);
    let response = get(&app, &format!("{}/journal-entries", base), &token).await;
    assert_eq!(response.json()["count"], 0);

    // 仍可取消
    let response = post(
        &app,
        &format!("{}/deliveries/{}/cancel", base, delivery_id),
        &token,
        json!({}),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "cancelled");
}

#[tokio::test]
async fn test_company_outside_scope_is_forbidden() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "clerk", None).await;

    let response = get(
        &app,
        &format!("/api/companies/{}/stock", SUBSIDIARY_US_ID),
        &token,
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = post(
        &app,
        &format!("/api/companies/{}/stock/adjust", SUBSIDIARY_US_ID),
        &token,
        Cell::new().adjustment("1", Some("1")),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_consolidated_read_but_not_write() {
    let (app, _) = create_test_app().await;
    let clerk = login_token(&app, "clerk", None).await;
    post(
        &app,
        &format!("/api/companies/{}/stock/adjust", BRANCH_NY_ID),
        &clerk,
        Cell::new().adjustment("8", Some("3")),
    )
    .await;

    // 美国子公司的控制员可以读取下级分公司的库存
    let controller = login_token(&app, "admin", Some(SUBSIDIARY_US_ID)).await;
    assert_eq!(
        stock_quantity(&app, &controller, BRANCH_NY_ID).await,
        vec![8.0]
    );

    let response = post(
        &app,
        &format!("/api/companies/{}/stock/adjust", BRANCH_NY_ID),
        &controller,
        Cell::new().adjustment("1", Some("1")),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_export_stock_csv() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "clerk", None).await;
    let cell = Cell::new();
    post(
        &app,
        &format!("/api/companies/{}/stock/adjust", BRANCH_NY_ID),
        &token,
        cell.adjustment("12", Some("0.75")),
    )
    .await;

    let response = get(
        &app,
        &format!("/api/companies/{}/stock/export", BRANCH_NY_ID),
        &token,
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let disposition = response.headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains("stock_"));

    let lines: Vec<&str> = response.text.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(
        lines[0],
        "warehouse_id,location_id,product_id,quantity,unit_cost,updated_at"
    );
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with(&format!(
        "{},{},{},12,0.75,",
        cell.warehouse_id, cell.location_id, cell.product_id
    )));
}

#[tokio::test]
async fn test_adjust_out_of_range_returns_error() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "clerk", None).await;
    let cell = Cell::new();
    let path = format!("/api/companies/{}/stock/adjust", BRANCH_NY_ID);

    let response = post(
        &app,
        &path,
        &token,
        cell.adjustment("79228162514264337593543950335", Some("1")),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let response = post(&app, &path, &token, cell.adjustment("1", None)).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json()["error"]["code"], 422);
}
