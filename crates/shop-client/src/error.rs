//! Error types for shop-client.

use std::time::Duration;

/// Result type alias for shop-client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for shop-client operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Create a cancellation error.
    pub fn canceled() -> Self {
        Self::new(ErrorKind::Canceled)
    }

    /// Classify this error for retry decisions.
    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Transient | ErrorClass::RateLimited)
    }

    /// Returns true if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::RateLimited { .. } | ErrorKind::ThrottleExhausted { .. }
        )
    }

    /// Returns true if this is an authentication or authorization error.
    pub fn is_auth_error(&self) -> bool {
        self.class() == ErrorClass::Unauthorized
    }

    /// Returns true if the operation was canceled.
    pub fn is_canceled(&self) -> bool {
        matches!(self.kind, ErrorKind::Canceled)
    }

    /// Returns the retry-after duration if this is a rate limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match &self.kind {
            ErrorKind::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Coarse classification of a failure, used to decide between retrying and
/// failing fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Credential or permission failure. Never retried.
    Unauthorized,
    /// 5xx/408 or ambiguous network failure. Retried with a fixed delay.
    Transient,
    /// 429 or the platform's throttling code. Retried with a budget-aware delay.
    RateLimited,
    /// Anything else. Never retried.
    Fatal,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorClass::Unauthorized => "unauthorized",
            ErrorClass::Transient => "transient",
            ErrorClass::RateLimited => "rate-limited",
            ErrorClass::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// HTTP request failed.
    #[error("HTTP error: {status} {message}")]
    Http { status: u16, message: String },

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limited{}", retry_after.map(|d| format!(", retry after {:?}", d)).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// Authentication error (HTTP 401).
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Authorization error (HTTP 403).
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Resource not found (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request timeout.
    #[error("Request timeout")]
    Timeout,

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// REST API error response.
    #[error("Shopify API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// GraphQL error reported in the response envelope.
    #[error("GraphQL error: {code} - {message}")]
    GraphQl { code: String, message: String },

    /// The cost throttler gave up after repeated THROTTLED responses.
    #[error("Throttled on all {attempts} attempts")]
    ThrottleExhausted { attempts: u32 },

    /// Pagination metadata was inconsistent.
    #[error("Pagination error: {0}")]
    Pagination(String),

    /// The operation was canceled by the caller.
    #[error("Operation canceled")]
    Canceled,

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    /// Classify this error kind.
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::Authentication(_) | ErrorKind::Authorization(_) => ErrorClass::Unauthorized,
            ErrorKind::RateLimited { .. } => ErrorClass::RateLimited,
            ErrorKind::Timeout | ErrorKind::Connection(_) => ErrorClass::Transient,
            ErrorKind::Http { status, .. } => classify_status(*status),
            _ => ErrorClass::Fatal,
        }
    }
}

/// Classify an HTTP status code.
pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        401 | 403 => ErrorClass::Unauthorized,
        429 => ErrorClass::RateLimited,
        408 | 500..=599 => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            ErrorKind::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ErrorKind::Json(err.to_string())
        } else if err.is_body() || err.is_request() {
            ErrorKind::Connection(err.to_string())
        } else {
            ErrorKind::Other(err.to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::InvalidUrl(err.to_string()), err)
    }
}
