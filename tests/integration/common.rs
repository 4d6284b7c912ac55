use std::time::Duration;

use busbar_shop_api::client::{QuotaConfig, RetryConfig};
use busbar_shop_api::{ClientConfig, ShopClient};
use wiremock::MockServer;

pub const API_VERSION: &str = "2024-10";
pub const TOKEN: &str = "shpat_integration";

/// A mock shop and a client pointed at it.
pub struct MockShop {
    pub server: MockServer,
    pub client: ShopClient,
}

impl MockShop {
    pub async fn start() -> Self {
        Self::with_quota(QuotaConfig::default()).await
    }

    pub async fn with_quota(quota: QuotaConfig) -> Self {
        let server = MockServer::start().await;
        let config = ClientConfig::builder()
            .with_retry(RetryConfig::fixed(3, Duration::from_millis(10)))
            .with_quota(quota)
            .build();
        let client = ShopClient::with_config(server.uri(), TOKEN, config).expect("client");
        Self { server, client }
    }

    pub fn rest_path(&self, resource: &str) -> String {
        format!("/admin/api/{API_VERSION}/{resource}.json")
    }

    pub fn graphql_path(&self) -> String {
        format!("/admin/api/{API_VERSION}/graphql.json")
    }
}

/// A GraphQL `extensions.cost` block.
pub fn cost(requested: u32, available: u32) -> serde_json::Value {
    serde_json::json!({"cost": {
        "requestedQueryCost": requested,
        "actualQueryCost": requested,
        "throttleStatus": {
            "maximumAvailable": 1000.0,
            "currentlyAvailable": available,
            "restoreRate": 50.0
        }
    }})
}
