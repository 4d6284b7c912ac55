//! # busbar-shop-graphql
//!
//! Shopify Admin GraphQL API client.
//!
//! Every call goes through the shop's [`CostThrottler`]: the client sleeps
//! whenever a response shows the remaining cost budget cannot cover another
//! call of the same cost, and retries THROTTLED responses.
//!
//! ## Example
//!
//! ```rust,ignore
//! use busbar_shop_graphql::{CancellationToken, ShopGraphQlClient};
//!
//! const PRODUCTS: &str = r#"
//!     query($cursor: String) {
//!         products(first: 250, after: $cursor) {
//!             nodes { id title }
//!             pageInfo { hasNextPage endCursor }
//!         }
//!     }
//! "#;
//!
//! let client = ShopGraphQlClient::new("https://demo.myshopify.com", "shpat_...")?;
//! let products: Vec<serde_json::Value> = client
//!     .query_all(PRODUCTS, Default::default(), &["products"], &CancellationToken::new())
//!     .await?;
//! ```
//!
//! [`CostThrottler`]: busbar_shop_client::CostThrottler

mod client;

pub use busbar_shop_client::{
    CancellationToken, Connection, Error, ErrorKind, GraphQlResponse, PageInfo, Result,
};
pub use client::{ShopGraphQlClient, CURSOR_VARIABLE};
