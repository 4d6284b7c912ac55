//! HTTP response handling with Shopify-specific extensions.

use std::sync::LazyLock;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{Error, ErrorKind, Result};

/// Header reporting REST bucket usage, e.g. `32/40`.
pub const CALL_LIMIT_HEADER: &str = "x-shopify-shop-api-call-limit";

/// Wrapper around an HTTP response.
#[derive(Debug)]
pub struct Response {
    inner: reqwest::Response,
}

impl Response {
    pub(crate) fn new(inner: reqwest::Response) -> Self {
        Self { inner }
    }

    /// Get the HTTP status code.
    pub fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name)?.to_str().ok()
    }

    /// Get the `Link` header, joining repeated headers with `,`.
    pub fn link(&self) -> Option<String> {
        join_header_values(self.inner.headers().get_all("link").iter().filter_map(|v| v.to_str().ok()))
    }

    /// Get the Retry-After header as a Duration.
    ///
    /// The platform sends whole or fractional seconds.
    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(self.header("retry-after")?)
    }

    /// REST bucket usage reported by the server.
    pub fn api_usage(&self) -> Option<ApiUsage> {
        ApiUsage::parse(self.header(CALL_LIMIT_HEADER)?)
    }

    /// Get the response body as text.
    pub async fn text(self) -> Result<String> {
        self.inner.text().await.map_err(Into::into)
    }

    /// Read the next chunk of the body, `None` once it is exhausted.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        self.inner.chunk().await.map_err(Into::into)
    }

    /// Deserialize the response body as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let body = self.inner.bytes().await?;
        serde_json::from_slice(&body).map_err(Into::into)
    }
}

fn join_header_values<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined = values.map(str::trim).filter(|v| !v.is_empty()).collect::<Vec<_>>().join(", ");
    (!joined.is_empty()).then_some(joined)
}

pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds = value.trim().parse::<f64>().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

/// REST bucket usage from response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiUsage {
    /// Calls currently held in the bucket.
    pub used: u64,
    /// Bucket size.
    pub limit: u64,
}

impl ApiUsage {
    /// Parse a `used/limit` header value.
    pub fn parse(value: &str) -> Option<Self> {
        let (used, limit) = value.trim().split_once('/')?;
        Some(Self {
            used: used.trim().parse().ok()?,
            limit: limit.trim().parse().ok()?,
        })
    }

    /// Get the remaining API calls.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    /// Get the usage percentage.
    pub fn percentage(&self) -> f64 {
        if self.limit == 0 {
            100.0
        } else {
            (self.used as f64 / self.limit as f64) * 100.0
        }
    }

    /// Returns true if API usage is above the given percentage threshold.
    pub fn is_above_threshold(&self, threshold_percent: f64) -> bool {
        self.percentage() >= threshold_percent
    }
}

/// Extension trait for processing Shopify API responses.
pub trait ResponseExt {
    /// Convert a non-success response into the matching error.
    fn check_shopify_error(self) -> impl std::future::Future<Output = Result<Response>> + Send;
}

impl ResponseExt for Response {
    async fn check_shopify_error(self) -> Result<Response> {
        if self.is_success() {
            return Ok(self);
        }

        let status = self.status();
        let retry_after = self.retry_after();
        let body = self.text().await.unwrap_or_default();
        Err(parse_error_response(status, retry_after, &body))
    }
}

/// Map a failed response to an error kind.
pub(crate) fn parse_error_response(status: u16, retry_after: Option<Duration>, body: &str) -> Error {
    if status == 429 {
        return Error::new(ErrorKind::RateLimited { retry_after });
    }

    let message = extract_error_message(body)
        .map(|message| sanitize_error_message(&message))
        .unwrap_or_else(|| sanitize_error_message(body));

    let kind = match status {
        401 => ErrorKind::Authentication(message),
        403 => ErrorKind::Authorization(message),
        404 => ErrorKind::NotFound(message),
        408 | 500..=599 => ErrorKind::Http { status, message },
        _ if !body.is_empty() => ErrorKind::Api { status, message },
        _ => ErrorKind::Http { status, message },
    };

    Error::new(kind)
}

/// REST errors come as `{"errors": "text"}` or `{"errors": {"field": ["msg"]}}`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let errors = value.get("errors").or_else(|| value.get("error"))?;

    match errors {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Object(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(field, messages)| match messages {
                    serde_json::Value::Array(items) => {
                        let joined: Vec<String> = items
                            .iter()
                            .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                            .collect();
                        format!("{field}: {}", joined.join(", "))
                    }
                    serde_json::Value::String(message) => format!("{field}: {message}"),
                    other => format!("{field}: {other}"),
                })
                .collect();
            Some(parts.join("; "))
        }
        other => Some(other.to_string()),
    }
}

static TOKEN_PATTERN: LazyLock<regex_lite::Regex> = LazyLock::new(|| {
    regex_lite::Regex::new(r"shp(?:at|ca|pa|ss)_[A-Za-z0-9]+").expect("valid token pattern")
});

/// Sanitize an error message to prevent exposing sensitive data.
///
/// Redacts access tokens and truncates messages longer than 500 bytes.
pub(crate) fn sanitize_error_message(message: &str) -> String {
    const MAX_LENGTH: usize = 500;

    let mut sanitized = TOKEN_PATTERN
        .replace_all(message, "[REDACTED_TOKEN]")
        .to_string();

    if sanitized.len() > MAX_LENGTH {
        let mut cut = MAX_LENGTH;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str("...[truncated]");
    }

    sanitized
}
