//! # busbar-shop-client
//!
//! Core HTTP client infrastructure for the Shopify Admin APIs.
//!
//! This crate provides the foundation the API crates build on:
//! - Error classification and retry with a constant (or backoff) delay
//! - A token bucket for the REST call limit
//! - Cost-reported throttling for GraphQL
//! - Cursor and `Link`-header pagination drivers
//! - Cooperative cancellation of every wait and request
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │          (shop-rest, shop-graphql, shop-bulk)               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ShopClient                            │
//! │  - Holds shop URL, access token, API version                │
//! │  - Owns the QuotaThrottler (REST) and CostThrottler (GQL)   │
//! │  - Typed JSON methods (rest_get, graphql, download)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ShopHttpClient                          │
//! │  - Raw HTTP with retry classification and cancellation      │
//! │  - Request building and response error mapping              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use busbar_shop_client::{CancellationToken, ShopClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), busbar_shop_client::Error> {
//!     let client = ShopClient::new("https://demo.myshopify.com", "shpat_...")?;
//!     let cancel = CancellationToken::new();
//!
//!     let shop: serde_json::Value = client.rest_get("shop", &cancel).await?;
//!     let data: serde_json::Value = client
//!         .graphql::<_, ()>("{ shop { name } }", None, &cancel)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod request;
mod response;
mod shop_client;

pub mod cancel;
pub mod cost;
pub mod graphql;
pub mod pagination;
pub mod retry;
pub mod throttle;

pub use cancel::CancellationToken;
pub use client::ShopHttpClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use cost::{compute_wait, CostState, CostThrottleConfig, CostThrottler};
pub use error::{classify_status, Error, ErrorClass, ErrorKind, Result};
pub use graphql::{Connection, GraphQlError, GraphQlRequest, GraphQlResponse, PageInfo};
pub use pagination::{paginate_cursor, paginate_link_header, LinkPage, Page, PageCursor};
pub use request::{RequestBuilder, RequestMethod};
pub use response::{ApiUsage, Response, ResponseExt};
pub use retry::{BackoffStrategy, RetryConfig, RetryOutcome, RetryPolicy};
pub use shop_client::ShopClient;
pub use throttle::{Budget, QuotaConfig, QuotaThrottler};

/// Default Admin API version.
pub const DEFAULT_API_VERSION: &str = "2024-10";

/// User-Agent string for the client.
pub const USER_AGENT: &str = concat!("busbar-shop-api/", env!("CARGO_PKG_VERSION"));
