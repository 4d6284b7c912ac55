//! High-level shop client with typed HTTP methods.
//!
//! `ShopClient` binds one shop, one access token, and one pair of
//! throttlers. Clones share the throttlers; separately constructed clients
//! never do.
//!
//! ## Security
//!
//! - Access tokens are redacted in Debug output
//! - Sensitive parameters are skipped in tracing spans

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::instrument;

use crate::cancel::CancellationToken;
use crate::client::ShopHttpClient;
use crate::config::ClientConfig;
use crate::cost::CostThrottler;
use crate::error::Result;
use crate::graphql::{GraphQlRequest, GraphQlResponse};
use crate::request::RequestBuilder;
use crate::response::{Response, ResponseExt};
use crate::throttle::QuotaThrottler;
use crate::DEFAULT_API_VERSION;

/// High-level Shopify Admin API client.
///
/// # Example
///
/// ```rust,ignore
/// use busbar_shop_client::{CancellationToken, ShopClient};
///
/// let client = ShopClient::for_shop("demo", "shpat_...")?;
/// let cancel = CancellationToken::new();
///
/// let shop: serde_json::Value = client.rest_get("shop", &cancel).await?;
/// ```
#[derive(Clone)]
pub struct ShopClient {
    http: ShopHttpClient,
    shop_url: String,
    access_token: String,
    api_version: String,
    rest_throttle: Arc<QuotaThrottler>,
    cost_throttle: Arc<CostThrottler>,
}

impl std::fmt::Debug for ShopClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopClient")
            .field("shop_url", &self.shop_url)
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl ShopClient {
    /// Create a client for a shop URL such as `https://demo.myshopify.com`.
    pub fn new(shop_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        Self::with_config(shop_url, access_token, ClientConfig::default())
    }

    /// Create a client for `{name}.myshopify.com`.
    pub fn for_shop(name: &str, access_token: impl Into<String>) -> Result<Self> {
        Self::new(format!("https://{name}.myshopify.com"), access_token)
    }

    /// Create a client with custom configuration.
    pub fn with_config(
        shop_url: impl Into<String>,
        access_token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let shop_url = shop_url.into().trim_end_matches('/').to_string();
        url::Url::parse(&shop_url)?;

        let rest_throttle = Arc::new(QuotaThrottler::new(config.quota));
        let cost_throttle = Arc::new(CostThrottler::new(config.cost.clone()));
        let http = ShopHttpClient::new(config)?;

        Ok(Self {
            http,
            shop_url,
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            rest_throttle,
            cost_throttle,
        })
    }

    /// Set the API version (e.g., "2024-10").
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Get the shop URL.
    pub fn shop_url(&self) -> &str {
        &self.shop_url
    }

    /// Get the access token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Get the API version.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &ShopHttpClient {
        &self.http
    }

    /// The REST token bucket shared by clones of this client.
    pub fn rest_throttle(&self) -> &QuotaThrottler {
        &self.rest_throttle
    }

    /// The GraphQL cost throttler shared by clones of this client.
    pub fn cost_throttle(&self) -> &CostThrottler {
        &self.cost_throttle
    }

    /// Build the full URL for a path.
    ///
    /// Absolute URLs are returned unchanged.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.shop_url, path)
        } else {
            format!("{}/{}", self.shop_url, path)
        }
    }

    /// Build the REST URL for a resource path.
    ///
    /// Example: `rest_url("products")` -> `/admin/api/2024-10/products.json`
    pub fn rest_url(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        let path = path.strip_suffix(".json").unwrap_or(path);
        format!("{}/admin/api/{}/{}.json", self.shop_url, self.api_version, path)
    }

    /// Build the GraphQL endpoint URL.
    pub fn graphql_url(&self) -> String {
        format!("{}/admin/api/{}/graphql.json", self.shop_url, self.api_version)
    }

    /// Create a GET request builder with authentication.
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url).access_token(&self.access_token)
    }

    /// Create a POST request builder with authentication.
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.http.post(url).access_token(&self.access_token)
    }

    // =========================================================================
    // REST
    // =========================================================================

    /// GET a REST resource through the token bucket.
    #[instrument(skip(self, cancel))]
    pub async fn rest_get<T: DeserializeOwned>(&self, path: &str, cancel: &CancellationToken) -> Result<T> {
        let (value, _) = self.rest_get_page(path, "", cancel).await?;
        Ok(value)
    }

    /// GET one page of a REST collection, returning the body and the raw
    /// `Link` header.
    ///
    /// `query` is a pre-encoded query string without the leading `?`.
    #[instrument(skip(self, cancel))]
    pub async fn rest_get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<(T, Option<String>)> {
        let mut url = self.rest_url(path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }

        let response = self
            .http
            .execute_throttled(self.get(&url), &self.rest_throttle, cancel)
            .await?;
        let link = response.link();
        Ok((response.json().await?, link))
    }

    // =========================================================================
    // GraphQL
    // =========================================================================

    /// Run a GraphQL query through the cost throttler and transport retry,
    /// returning the whole envelope.
    #[instrument(skip(self, query, variables, cancel))]
    pub async fn graphql_envelope<T, V>(
        &self,
        query: &str,
        variables: Option<&V>,
        cancel: &CancellationToken,
    ) -> Result<GraphQlResponse<T>>
    where
        T: DeserializeOwned,
        V: Serialize,
    {
        let request = self
            .post(&self.graphql_url())
            .json(&GraphQlRequest { query, variables })?;
        let request = &request;
        let http = &self.http;

        self.cost_throttle
            .execute_envelope(cancel, move || async move {
                http.execute(request.clone(), cancel).await?.json().await
            })
            .await
    }

    /// Run a GraphQL query and return its `data`.
    pub async fn graphql<T, V>(&self, query: &str, variables: Option<&V>, cancel: &CancellationToken) -> Result<T>
    where
        T: DeserializeOwned,
        V: Serialize,
    {
        let request = self
            .post(&self.graphql_url())
            .json(&GraphQlRequest { query, variables })?;
        let request = &request;
        let http = &self.http;

        self.cost_throttle
            .execute(cancel, move || async move {
                http.execute(request.clone(), cancel).await?.json().await
            })
            .await
    }

    /// Run a GraphQL operation without transport retry.
    ///
    /// Used for mutations with side effects. THROTTLED responses are still
    /// retried, since a throttled operation did not run.
    #[instrument(skip(self, query, variables, cancel))]
    pub async fn graphql_once<T, V>(
        &self,
        query: &str,
        variables: Option<&V>,
        cancel: &CancellationToken,
    ) -> Result<GraphQlResponse<T>>
    where
        T: DeserializeOwned,
        V: Serialize,
    {
        let request = self
            .post(&self.graphql_url())
            .json(&GraphQlRequest { query, variables })?;
        let request = &request;
        let http = &self.http;

        self.cost_throttle
            .execute_envelope(cancel, move || async move {
                let response = http.execute_once(request, cancel).await?;
                response.check_shopify_error().await?.json().await
            })
            .await
    }

    // =========================================================================
    // Downloads
    // =========================================================================

    /// GET a pre-signed URL (e.g. a bulk result file) with transport retry.
    ///
    /// The access token is not sent; the URL carries its own authorization.
    #[instrument(skip(self, url, cancel))]
    pub async fn download(&self, url: &str, cancel: &CancellationToken) -> Result<Response> {
        self.http.execute(self.http.get(url), cancel).await
    }
}
