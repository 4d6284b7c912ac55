//! GraphQL client.

use busbar_shop_client::{
    paginate_cursor, CancellationToken, ClientConfig, Connection, Error, ErrorKind,
    GraphQlResponse, Page, Result, ShopClient,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Variable that carries the page cursor in [`ShopGraphQlClient::query_all`].
pub const CURSOR_VARIABLE: &str = "cursor";

/// Shopify Admin GraphQL API client.
#[derive(Debug, Clone)]
pub struct ShopGraphQlClient {
    client: ShopClient,
}

impl ShopGraphQlClient {
    /// Create a new GraphQL client with the given shop URL and access token.
    pub fn new(shop_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let client = ShopClient::new(shop_url, access_token)?;
        Ok(Self { client })
    }

    /// Create a new GraphQL client with custom HTTP configuration.
    pub fn with_config(
        shop_url: impl Into<String>,
        access_token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let client = ShopClient::with_config(shop_url, access_token, config)?;
        Ok(Self { client })
    }

    /// Create a GraphQL client from an existing ShopClient.
    pub fn from_client(client: ShopClient) -> Self {
        Self { client }
    }

    /// Get the underlying ShopClient.
    pub fn inner(&self) -> &ShopClient {
        &self.client
    }

    /// Run a query and return its `data`.
    pub async fn query<T, V>(&self, query: &str, variables: Option<&V>, cancel: &CancellationToken) -> Result<T>
    where
        T: DeserializeOwned,
        V: Serialize,
    {
        self.client.graphql(query, variables, cancel).await
    }

    /// Run a query and return the whole response envelope.
    pub async fn query_envelope<T, V>(
        &self,
        query: &str,
        variables: Option<&V>,
        cancel: &CancellationToken,
    ) -> Result<GraphQlResponse<T>>
    where
        T: DeserializeOwned,
        V: Serialize,
    {
        self.client.graphql_envelope(query, variables, cancel).await
    }

    /// Run a mutation without transport retry and return its `data`.
    #[instrument(skip(self, mutation, variables, cancel))]
    pub async fn mutate<T, V>(&self, mutation: &str, variables: Option<&V>, cancel: &CancellationToken) -> Result<T>
    where
        T: DeserializeOwned,
        V: Serialize,
    {
        let response = self.client.graphql_once(mutation, variables, cancel).await?;
        response.data.ok_or_else(|| {
            Error::new(ErrorKind::GraphQl {
                code: "NO_DATA".to_string(),
                message: "Mutation response contained no data".to_string(),
            })
        })
    }

    /// Fetch every node of a connection.
    ///
    /// The query must declare a `$cursor: String` variable and pass it as the
    /// connection's `after` argument. `connection_path` names the fields
    /// leading from `data` to the connection, e.g. `["products"]` or
    /// `["collection", "products"]`.
    #[instrument(skip(self, query, variables, cancel))]
    pub async fn query_all<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Map<String, Value>,
        connection_path: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<T>> {
        let this = self;
        let variables = &variables;

        let items = paginate_cursor(cancel, move |cursor: Option<String>| async move {
            let mut page_variables = variables.clone();
            page_variables.insert(
                CURSOR_VARIABLE.to_string(),
                cursor.map(Value::String).unwrap_or(Value::Null),
            );

            let data: Value = this.query(query, Some(&page_variables), cancel).await?;
            connection_page(data, connection_path)
        })
        .await?;

        debug!(count = items.len(), "Fetched connection");
        Ok(items)
    }
}

/// Extract the connection at `path` from `data` as one page.
fn connection_page<T: DeserializeOwned>(mut data: Value, path: &[&str]) -> Result<Page<T>> {
    for field in path {
        data = match data {
            Value::Object(mut map) => map.remove(*field).unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }
    if data.is_null() {
        return Err(Error::new(ErrorKind::Pagination(format!(
            "no connection at `{}`",
            path.join(".")
        ))));
    }

    let connection: Connection<T> = serde_json::from_value(data)?;
    let next = connection.page_info.clone().into();
    Ok(Page {
        items: connection.into_items(),
        next,
    })
}
