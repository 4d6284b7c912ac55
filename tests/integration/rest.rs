//! REST extraction through the shared quota bucket.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use busbar_shop_api::client::QuotaConfig;
use busbar_shop_api::rest::ErrorKind;
use busbar_shop_api::{CancellationToken, ShopRestClient};
use serde::Deserialize;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, Request, ResponseTemplate};

use super::common::{MockShop, TOKEN};

#[derive(Debug, Deserialize)]
struct Order {
    id: u64,
    name: String,
}

fn orders(ids: &[u64]) -> serde_json::Value {
    let orders: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| serde_json::json!({"id": id, "name": format!("#{id}")}))
        .collect();
    serde_json::json!({ "orders": orders })
}

#[tokio::test]
async fn test_list_all_follows_links_through_rate_limit() {
    let shop = MockShop::start().await;
    let next = format!(
        "<{}{}?limit=2&page_info=p2>; rel=\"next\"",
        shop.server.uri(),
        shop.rest_path("orders")
    );
    let second_calls = Arc::new(AtomicU32::new(0));
    let second_calls_clone = second_calls.clone();

    Mock::given(method("GET"))
        .and(path(shop.rest_path("orders")))
        .and(query_param("status", "any"))
        .and(header("X-Shopify-Access-Token", TOKEN))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", next.as_str())
                .insert_header("X-Shopify-Shop-Api-Call-Limit", "1/40")
                .set_body_json(orders(&[1, 2])),
        )
        .expect(1)
        .mount(&shop.server)
        .await;

    Mock::given(method("GET"))
        .and(path(shop.rest_path("orders")))
        .and(query_param("page_info", "p2"))
        .respond_with(move |_: &Request| {
            if second_calls_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(429).insert_header("Retry-After", "0.1")
            } else {
                ResponseTemplate::new(200).set_body_json(orders(&[3]))
            }
        })
        .mount(&shop.server)
        .await;

    let client = ShopRestClient::from_client(shop.client.clone());
    let orders: Vec<Order> = client
        .list_all("orders", &[("status", "any"), ("limit", "2")], &CancellationToken::new())
        .await
        .unwrap();

    let ids: Vec<u64> = orders.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(orders[2].name, "#3");
    assert_eq!(second_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_clones_share_one_bucket() {
    let shop = MockShop::with_quota(QuotaConfig {
        capacity: 10,
        release_interval: Duration::from_secs(3600),
        tokens_per_release: 1,
    })
    .await;

    Mock::given(method("GET"))
        .and(path(shop.rest_path("products/count")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"count": 7})))
        .mount(&shop.server)
        .await;

    let first = ShopRestClient::from_client(shop.client.clone());
    let second = ShopRestClient::from_client(shop.client.clone());
    let cancel = CancellationToken::new();

    assert_eq!(first.count("products", &cancel).await.unwrap(), 7);
    assert_eq!(second.count("products", &cancel).await.unwrap(), 7);

    let budget = shop.client.rest_throttle().budget().await;
    assert_eq!(budget.capacity - budget.available, 2);
}

#[tokio::test]
async fn test_unauthorized_is_surfaced_once() {
    let shop = MockShop::start().await;

    Mock::given(method("GET"))
        .and(path(shop.rest_path("customers")))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({"errors": "[API] Invalid API key or access token (unrecognized login or wrong password)"})),
        )
        .expect(1)
        .mount(&shop.server)
        .await;

    let err = ShopRestClient::from_client(shop.client.clone())
        .list_all::<serde_json::Value>("customers", &[], &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::Authentication(_)));
    assert!(err.is_auth_error());
}
