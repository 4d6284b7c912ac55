//! Bulk exports sharing a client with other API traffic.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use busbar_shop_api::bulk::{ErrorKind, PollSchedule, ReportDefinition, ReportRegistry};
use busbar_shop_api::{BulkExporter, CancellationToken, ReportType};
use serde::Deserialize;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, Request, ResponseTemplate};

use super::common::{cost, MockShop};

const OP_ID: &str = "gid://shopify/BulkOperation/5001";

const ORDERS_FILE: &str = concat!(
    r##"{"id":"gid://shopify/Order/1","name":"#1001"}"##,
    "\n",
    r##"{"id":"gid://shopify/LineItem/11","sku":"TEE-S","quantity":2,"__parentId":"gid://shopify/Order/1"}"##,
    "\n",
    r##"{"id":"gid://shopify/Order/2","name":"#1002"}"##,
    "\n",
    r##"{"id":"gid://shopify/Order/3","name":"#1003"}"##,
    "\n",
    r##"{"id":"gid://shopify/LineItem/31","sku":"TEE-M","quantity":1,"__parentId":"gid://shopify/Order/3"}"##,
    "\n",
    r##"{"id":"gid://shopify/LineItem/32","sku":"MUG","quantity":4,"__parentId":"gid://shopify/Order/3"}"##,
);

#[derive(Debug, Deserialize)]
struct Order {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LineItem {
    sku: String,
    quantity: u32,
}

fn operation(status: &str, url: Option<&str>) -> Value {
    json!({"id": OP_ID, "status": status, "errorCode": null, "objectCount": "6", "url": url})
}

async fn mount_submit(shop: &MockShop) {
    Mock::given(method("POST"))
        .and(path(shop.graphql_path()))
        .and(body_string_contains("bulkOperationRunQuery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"bulkOperationRunQuery": {"bulkOperation": operation("CREATED", None), "userErrors": []}},
            "extensions": cost(10, 990)
        })))
        .expect(1)
        .mount(&shop.server)
        .await;
}

fn exporter(shop: &MockShop) -> BulkExporter {
    BulkExporter::from_client(shop.client.clone())
        .with_poll_schedule(PollSchedule::fixed(Duration::from_millis(10), 5))
}

#[tokio::test]
async fn test_orders_report_end_to_end() {
    let shop = MockShop::start().await;
    let result_url = format!("{}/results/5001.jsonl", shop.server.uri());
    let polls = Arc::new(AtomicU32::new(0));
    let polls_clone = polls.clone();

    mount_submit(&shop).await;

    Mock::given(method("POST"))
        .and(path(shop.graphql_path()))
        .and(body_string_contains("currentBulkOperation"))
        .respond_with(move |_: &Request| {
            let op = match polls_clone.fetch_add(1, Ordering::SeqCst) {
                0 => operation("CREATED", None),
                1 => operation("RUNNING", None),
                _ => operation("COMPLETED", Some(result_url.as_str())),
            };
            ResponseTemplate::new(200).set_body_json(json!({
                "data": {"currentBulkOperation": op},
                "extensions": cost(1, 999)
            }))
        })
        .mount(&shop.server)
        .await;

    // First download attempt fails; the retry succeeds.
    let downloads = Arc::new(AtomicU32::new(0));
    let downloads_clone = downloads.clone();
    Mock::given(method("GET"))
        .and(path("/results/5001.jsonl"))
        .respond_with(move |_: &Request| {
            if downloads_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_string(ORDERS_FILE)
            }
        })
        .mount(&shop.server)
        .await;

    let records = exporter(&shop)
        .run_records::<Order, LineItem>(&ReportType::Orders, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(polls.load(Ordering::SeqCst), 3);
    assert_eq!(downloads.load(Ordering::SeqCst), 2);

    let summary: Vec<(&str, usize)> = records
        .iter()
        .map(|r| (r.parent.name.as_str(), r.children.len()))
        .collect();
    assert_eq!(summary, vec![("#1001", 1), ("#1002", 0), ("#1003", 2)]);

    let units: u32 = records[2].children.iter().map(|item| item.quantity).sum();
    assert_eq!(units, 5);
    assert_eq!(records[0].children[0].sku, "TEE-S");
}

#[tokio::test]
async fn test_custom_report_through_registry() {
    let shop = MockShop::start().await;
    let result_url = format!("{}/results/5001.jsonl", shop.server.uri());

    mount_submit(&shop).await;
    Mock::given(method("POST"))
        .and(path(shop.graphql_path()))
        .and(body_string_contains("currentBulkOperation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"currentBulkOperation": operation("COMPLETED", Some(result_url.as_str()))}
        })))
        .mount(&shop.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/results/5001.jsonl"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"id\":\"gid://shopify/Location/1\",\"name\":\"Main\"}\n{\"id\":\"gid://shopify/Location/2\",\"name\":\"Annex\"}\n",
        ))
        .mount(&shop.server)
        .await;

    let mut registry = ReportRegistry::new();
    registry.register(
        ReportType::from("locations"),
        ReportDefinition::new("{ locations { edges { node { id name } } } }"),
    );

    let names = exporter(&shop)
        .with_registry(registry)
        .run(
            &ReportType::from("locations"),
            |record| Ok(record.parent["name"].as_str().unwrap_or_default().to_string()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(names, vec!["Main", "Annex"]);
}

#[tokio::test]
async fn test_unregistered_report_sends_nothing() {
    let shop = MockShop::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&shop.server)
        .await;

    let err = exporter(&shop)
        .with_registry(ReportRegistry::new())
        .run_untyped(&ReportType::Products, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::UnknownReport(_)));
}

#[tokio::test]
async fn test_expired_operation() {
    let shop = MockShop::start().await;

    mount_submit(&shop).await;
    Mock::given(method("POST"))
        .and(path(shop.graphql_path()))
        .and(body_string_contains("currentBulkOperation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"currentBulkOperation": operation("EXPIRED", None)}
        })))
        .expect(1)
        .mount(&shop.server)
        .await;

    let err = exporter(&shop)
        .run_untyped(&ReportType::Products, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err.kind,
        ErrorKind::ReportGeneration { status: busbar_shop_api::bulk::BulkOperationStatus::Expired, .. }
    ));
}
