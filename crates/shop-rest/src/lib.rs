//! # busbar-shop-rest
//!
//! Shopify Admin REST API client.
//!
//! Every call takes a token from the shop's REST bucket before it is sent,
//! and collections are walked through the `Link` header's `rel="next"`
//! entries.
//!
//! ## Example
//!
//! ```rust,ignore
//! use busbar_shop_rest::{CancellationToken, ShopRestClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), busbar_shop_rest::Error> {
//!     let client = ShopRestClient::new("https://demo.myshopify.com", "shpat_...")?;
//!     let cancel = CancellationToken::new();
//!
//!     let products: Vec<serde_json::Value> = client
//!         .list_all("products", &[("limit", "250"), ("status", "active")], &cancel)
//!         .await?;
//!     let total = client.count("orders", &cancel).await?;
//!
//!     Ok(())
//! }
//! ```

mod client;

pub use busbar_shop_client::{CancellationToken, Error, ErrorKind, LinkPage, Result};
pub use client::{encode_query, ShopRestClient};
