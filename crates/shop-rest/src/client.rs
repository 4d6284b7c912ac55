//! REST resource client.

use busbar_shop_client::{
    paginate_link_header, CancellationToken, ClientConfig, Error, ErrorKind, LinkPage, Result,
    ShopClient,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Shopify Admin REST API client.
///
/// Wraps a [`ShopClient`]; clones share its REST bucket.
#[derive(Debug, Clone)]
pub struct ShopRestClient {
    client: ShopClient,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

impl ShopRestClient {
    /// Create a new REST client with the given shop URL and access token.
    pub fn new(shop_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let client = ShopClient::new(shop_url, access_token)?;
        Ok(Self { client })
    }

    /// Create a new REST client with custom HTTP configuration.
    pub fn with_config(
        shop_url: impl Into<String>,
        access_token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let client = ShopClient::with_config(shop_url, access_token, config)?;
        Ok(Self { client })
    }

    /// Create a REST client from an existing ShopClient.
    pub fn from_client(client: ShopClient) -> Self {
        Self { client }
    }

    /// Get the underlying ShopClient.
    pub fn inner(&self) -> &ShopClient {
        &self.client
    }

    /// Get the shop URL.
    pub fn shop_url(&self) -> &str {
        self.client.shop_url()
    }

    /// Get the API version.
    pub fn api_version(&self) -> &str {
        self.client.api_version()
    }

    /// Set the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.client = self.client.with_api_version(version);
        self
    }

    /// GET a resource, e.g. `shop` or `products/632910392`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, cancel: &CancellationToken) -> Result<T> {
        self.client.rest_get(path, cancel).await
    }

    /// Fetch one page of a collection.
    ///
    /// Items are read from the body's root key, which is the last segment of
    /// `resource` (`products/1/variants` reads `variants`).
    #[instrument(skip(self, cancel))]
    pub async fn list_page<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<LinkPage<T>> {
        let (mut body, link_header): (serde_json::Map<String, serde_json::Value>, _) =
            self.client.rest_get_page(resource, query, cancel).await?;

        let key = root_key(resource);
        let items = body.remove(key).ok_or_else(|| {
            Error::new(ErrorKind::Json(format!("response has no `{key}` collection")))
        })?;
        let items: Vec<T> = serde_json::from_value(items)?;

        Ok(LinkPage { items, link_header })
    }

    /// Fetch every item of a collection, following `Link` headers.
    ///
    /// `params` apply to the first request only; later requests use the
    /// query of the server's `next` link.
    #[instrument(skip(self, params, cancel))]
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<Vec<T>> {
        let this = self;
        let items = paginate_link_header(cancel, encode_query(params), move |query: String| async move {
            this.list_page(resource, &query, cancel).await
        })
        .await?;

        debug!(resource, count = items.len(), "Listed collection");
        Ok(items)
    }

    /// Number of items in a collection (`{resource}/count`).
    #[instrument(skip(self, cancel))]
    pub async fn count(&self, resource: &str, cancel: &CancellationToken) -> Result<u64> {
        let resource = resource.trim_matches('/');
        let resource = resource.strip_suffix(".json").unwrap_or(resource);
        let response: CountResponse = self
            .client
            .rest_get(&format!("{resource}/count"), cancel)
            .await?;
        Ok(response.count)
    }
}

fn root_key(resource: &str) -> &str {
    let resource = resource.trim_matches('/');
    let resource = resource.strip_suffix(".json").unwrap_or(resource);
    resource.rsplit('/').next().unwrap_or(resource)
}

/// Encode query parameters as `name=value&...`.
pub fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}
