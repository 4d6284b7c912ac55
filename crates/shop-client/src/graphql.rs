//! GraphQL request and response envelopes.
//!
//! Only the parts of the envelope the client needs for throttling and
//! pagination are modelled here; `data` is left to the caller's type.

use serde::{Deserialize, Serialize};

use crate::cost::CostState;
use crate::pagination::PageCursor;

/// A GraphQL request body.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest<'a, V: Serialize> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<V>,
}

/// A GraphQL response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
    #[serde(default)]
    pub extensions: Option<ResponseExtensions>,
}

impl<T> GraphQlResponse<T> {
    /// The cost snapshot reported with this response, if any.
    pub fn cost(&self, default_restore_rate: f64) -> Option<CostState> {
        let cost = self.extensions.as_ref()?.cost.as_ref()?;
        Some(CostState::new(
            cost.requested_query_cost,
            cost.throttle_status.currently_available,
            cost.throttle_status.restore_rate,
            default_restore_rate,
        ))
    }

    /// The first reported error, if any.
    pub fn first_error(&self) -> Option<&GraphQlError> {
        self.errors.first()
    }
}

/// A single entry of the `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
}

impl GraphQlError {
    /// The machine-readable error code, if present.
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.code.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorExtensions {
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseExtensions {
    pub cost: Option<QueryCost>,
}

/// The `extensions.cost` block.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCost {
    pub requested_query_cost: f64,
    pub actual_query_cost: Option<f64>,
    pub throttle_status: ThrottleStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleStatus {
    pub maximum_available: f64,
    pub currently_available: f64,
    #[serde(default)]
    pub restore_rate: f64,
}

/// Relay-style page info.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl From<PageInfo> for PageCursor {
    fn from(info: PageInfo) -> Self {
        PageCursor {
            token: info.end_cursor,
            has_more: info.has_next_page,
        }
    }
}

/// A connection, accepting either `nodes` or `edges { node }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
    #[serde(default)]
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: Option<String>,
}

impl<T> Connection<T> {
    /// All items on this page, from `nodes` followed by `edges`.
    pub fn into_items(self) -> Vec<T> {
        let mut items = self.nodes;
        items.extend(self.edges.into_iter().map(|edge| edge.node));
        items
    }
}
