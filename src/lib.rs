//! # busbar-shop-api
//!
//! A Shopify Admin API extraction client for Rust.
//!
//! The hard part of pulling data out of a shop is not the data shapes but
//! the request orchestration: when a call may be sent, how to recover from
//! transient and rate-limit failures, how to walk paginated collections to
//! the end, and how to drive a bulk export through to a parsed result.
//!
//! ## Security
//!
//! - Access tokens are redacted in Debug output
//! - Tracing skips credential parameters
//! - Server error messages are sanitized before they reach an error value
//!
//! ## Crates
//!
//! - **busbar-shop-client** - HTTP core: retry policy, quota and cost throttling, pagination, cancellation
//! - **busbar-shop-rest** - REST Admin API: resources, Link-header pagination, counts
//! - **busbar-shop-graphql** - GraphQL Admin API: cost-throttled queries, cursor pagination
//! - **busbar-shop-bulk** - Bulk exports: submit, poll, download, and JSONL parsing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use busbar_shop_api::{CancellationToken, ShopRestClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ShopRestClient::new("https://demo.myshopify.com", "shpat_...")?;
//!     let cancel = CancellationToken::new();
//!
//!     let products: Vec<serde_json::Value> = client
//!         .list_all("products", &[("limit", "250")], &cancel)
//!         .await?;
//!
//!     for product in products {
//!         println!("{}", product["title"]);
//!     }
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "bulk")]
pub use busbar_shop_bulk as bulk;
#[cfg(feature = "client")]
pub use busbar_shop_client as client;
#[cfg(feature = "graphql")]
pub use busbar_shop_graphql as graphql;
#[cfg(feature = "rest")]
pub use busbar_shop_rest as rest;

// Re-export commonly used types at the top level
#[cfg(feature = "bulk")]
pub use busbar_shop_bulk::{BulkExporter, ReportType};
#[cfg(feature = "client")]
pub use busbar_shop_client::{CancellationToken, ClientConfig, ShopClient};
#[cfg(feature = "graphql")]
pub use busbar_shop_graphql::ShopGraphQlClient;
#[cfg(feature = "rest")]
pub use busbar_shop_rest::ShopRestClient;
