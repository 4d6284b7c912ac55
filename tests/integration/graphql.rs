//! GraphQL extraction through the cost throttler.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use busbar_shop_api::{CancellationToken, ShopGraphQlClient};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, Request, ResponseTemplate};

use super::common::{cost, MockShop};

const CUSTOMERS: &str = "query($cursor: String) { customers(first: 2, after: $cursor) { \
     edges { cursor node { id email } } pageInfo { hasNextPage endCursor } } }";

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
    email: String,
}

#[tokio::test]
async fn test_query_all_waits_for_cost_budget() {
    let shop = MockShop::start().await;
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    Mock::given(method("POST"))
        .and(path(shop.graphql_path()))
        .respond_with(move |request: &Request| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            if body["variables"]["cursor"].is_null() {
                // Two points left for a four-point query: the next call waits.
                ResponseTemplate::new(200).set_body_json(json!({
                    "data": {"customers": {
                        "edges": [
                            {"cursor": "c1", "node": {"id": "gid://shopify/Customer/1", "email": "a@example.com"}},
                            {"cursor": "c2", "node": {"id": "gid://shopify/Customer/2", "email": "b@example.com"}}
                        ],
                        "pageInfo": {"hasNextPage": true, "endCursor": "c2"}
                    }},
                    "extensions": cost(4, 2)
                }))
            } else {
                ResponseTemplate::new(200).set_body_json(json!({
                    "data": {"customers": {
                        "edges": [
                            {"cursor": "c3", "node": {"id": "gid://shopify/Customer/3", "email": "c@example.com"}}
                        ],
                        "pageInfo": {"hasNextPage": false, "endCursor": "c3"}
                    }},
                    "extensions": cost(4, 996)
                }))
            }
        })
        .mount(&shop.server)
        .await;

    let client = ShopGraphQlClient::from_client(shop.client.clone());
    let started = Instant::now();
    let customers: Vec<Customer> = client
        .query_all(CUSTOMERS, Map::new(), &["customers"], &CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(900));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let emails: Vec<&str> = customers.iter().map(|c| c.email.as_str()).collect();
    assert_eq!(emails, vec!["a@example.com", "b@example.com", "c@example.com"]);
    assert!(customers[0].id.ends_with("/1"));

    let last = shop.client.cost_throttle().last_cost().unwrap();
    assert_eq!(last.remaining_available, 996.0);
}

#[tokio::test]
async fn test_server_errors_retried_then_surfaced() {
    let shop = MockShop::start().await;

    Mock::given(method("POST"))
        .and(path(shop.graphql_path()))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&shop.server)
        .await;

    let err = ShopGraphQlClient::from_client(shop.client.clone())
        .query::<Value, ()>("{ shop { name } }", None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_retryable());
}
