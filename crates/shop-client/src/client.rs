//! Core HTTP client with retry, throttling, and Shopify-specific handling.

use tracing::{debug, info, instrument};

use crate::cancel::CancellationToken;
use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::request::{RequestBody, RequestBuilder, RequestMethod, ACCESS_TOKEN_HEADER};
use crate::response::{parse_retry_after, Response, ResponseExt};
use crate::retry;
use crate::throttle::QuotaThrottler;

/// HTTP client for Shopify APIs with built-in retry and error handling.
#[derive(Debug, Clone)]
pub struct ShopHttpClient {
    inner: reqwest::Client,
    config: ClientConfig,
}

impl ShopHttpClient {
    /// Create a new HTTP client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.accept_compressed)
            .deflate(config.accept_compressed);

        let inner = builder
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        Ok(Self { inner, config })
    }

    /// Create a new HTTP client with default configuration.
    pub fn default_client() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create a GET request builder.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestMethod::Get, url)
    }

    /// Create a POST request builder.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestMethod::Post, url)
    }

    /// Execute a request under the configured retry policy.
    ///
    /// Non-success responses are converted to errors before classification,
    /// so a 401 fails fast while a 503 is retried.
    #[instrument(skip(self, request, cancel), fields(method = ?request.method, url = %request.url))]
    pub async fn execute(&self, request: RequestBuilder, cancel: &CancellationToken) -> Result<Response> {
        let retry_config = self.config.effective_retry();
        let request = &request;
        retry::execute(&retry_config, cancel, Error::class, move || async move {
            let response = self.execute_once(request, cancel).await?;
            response.check_shopify_error().await
        })
        .await
    }

    /// Execute a request, taking one token from `throttler` before every attempt.
    #[instrument(skip(self, request, throttler, cancel), fields(method = ?request.method, url = %request.url))]
    pub async fn execute_throttled(
        &self,
        request: RequestBuilder,
        throttler: &QuotaThrottler,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let retry_config = self.config.effective_retry();
        let request = &request;
        retry::execute(&retry_config, cancel, Error::class, move || async move {
            throttler.acquire(cancel).await?;
            let response = self.execute_once(request, cancel).await?;
            response.check_shopify_error().await
        })
        .await
    }

    /// Execute a single request without retry logic.
    ///
    /// The request is abandoned as soon as `cancel` fires.
    pub async fn execute_once(&self, request: &RequestBuilder, cancel: &CancellationToken) -> Result<Response> {
        let mut req = self.inner.request(request.method.to_reqwest(), &request.url);

        if let Some(ref token) = request.access_token {
            req = req.header(ACCESS_TOKEN_HEADER, token.as_str());
        }

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        if !request.query_params.is_empty() {
            req = req.query(&request.query_params);
        }

        if let Some(ref body) = request.body {
            req = match body {
                RequestBody::Json(value) => req.json(value),
            };
        }

        if self.config.enable_tracing {
            debug!(method = ?request.method, url = %request.url, "Sending request");
        }

        let response = cancel
            .run(async { req.send().await.map_err(Error::from) })
            .await?;

        let status = response.status().as_u16();
        if self.config.enable_tracing {
            let content_length = response.content_length();
            if response.status().is_success() {
                debug!(status, content_length, "Response received");
            } else {
                info!(status, content_length, "Non-success response");
            }
        }

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(Error::new(ErrorKind::RateLimited { retry_after }));
        }

        Ok(Response::new(response))
    }
}
