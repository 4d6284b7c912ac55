//! Bulk export coordinator.
//!
//! Drives one export through `submit → poll → validate → download → parse`.
//! Each step is also exposed on its own so callers can resume or inspect an
//! operation started elsewhere.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use busbar_shop_client::{CancellationToken, ClientConfig, ShopClient};
use busbar_shop_graphql::ShopGraphQlClient;

use crate::error::{Error, ErrorKind, Result};
use crate::jsonl::{JsonlParser, DEFAULT_LINKAGE_FIELD};
use crate::registry::{ReportRegistry, ReportType};
use crate::schedule::PollSchedule;
use crate::types::*;

const OPERATION_FIELDS: &str =
    "id status errorCode createdAt completedAt objectCount fileSize url partialDataUrl";

fn run_query_mutation() -> String {
    format!(
        "mutation bulkOperationRunQuery($query: String!) {{ \
         bulkOperationRunQuery(query: $query) {{ \
         bulkOperation {{ {OPERATION_FIELDS} }} userErrors {{ field message code }} }} }}"
    )
}

fn current_operation_query() -> String {
    format!("query {{ currentBulkOperation {{ {OPERATION_FIELDS} }} }}")
}

fn cancel_mutation() -> String {
    format!(
        "mutation bulkOperationCancel($id: ID!) {{ \
         bulkOperationCancel(id: $id) {{ \
         bulkOperation {{ {OPERATION_FIELDS} }} userErrors {{ field message }} }} }}"
    )
}

fn join_user_errors(errors: &[UserError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Runs bulk query operations and returns their parsed results.
///
/// # Example
///
/// ```rust,ignore
/// use busbar_shop_bulk::{BulkExporter, ReportType};
/// use busbar_shop_client::CancellationToken;
///
/// let exporter = BulkExporter::new("https://demo.myshopify.com", "shpat_...")?;
/// let cancel = CancellationToken::new();
///
/// let records = exporter.run_untyped(&ReportType::ProductVariantInventory, &cancel).await?;
/// for record in records {
///     println!("{} has {} inventory levels", record.parent["sku"], record.children.len());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BulkExporter {
    graphql: ShopGraphQlClient,
    registry: ReportRegistry,
    schedule: PollSchedule,
}

impl BulkExporter {
    /// Create an exporter with the standard reports and poll schedule.
    pub fn new(shop_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let graphql = ShopGraphQlClient::new(shop_url, access_token)?;
        Ok(Self::from_graphql(graphql))
    }

    /// Create an exporter with custom HTTP configuration.
    pub fn with_config(
        shop_url: impl Into<String>,
        access_token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let graphql = ShopGraphQlClient::with_config(shop_url, access_token, config)?;
        Ok(Self::from_graphql(graphql))
    }

    /// Create an exporter from an existing ShopClient.
    ///
    /// Clones of one client share rate budgets, so an exporter built this
    /// way competes fairly with other work on the same shop.
    pub fn from_client(client: ShopClient) -> Self {
        Self::from_graphql(ShopGraphQlClient::from_client(client))
    }

    /// Create an exporter around an existing GraphQL client.
    pub fn from_graphql(graphql: ShopGraphQlClient) -> Self {
        Self {
            graphql,
            registry: ReportRegistry::standard(),
            schedule: PollSchedule::default(),
        }
    }

    /// Replace the report registry.
    pub fn with_registry(mut self, registry: ReportRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the poll schedule.
    pub fn with_poll_schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Registered reports.
    pub fn registry(&self) -> &ReportRegistry {
        &self.registry
    }

    /// Registered reports, for adding custom ones.
    pub fn registry_mut(&mut self) -> &mut ReportRegistry {
        &mut self.registry
    }

    /// Delays used while waiting for an operation to finish.
    pub fn poll_schedule(&self) -> &PollSchedule {
        &self.schedule
    }

    /// Get the underlying GraphQL client.
    pub fn inner(&self) -> &ShopGraphQlClient {
        &self.graphql
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Run a registered report and map each record through `parse`.
    #[instrument(skip(self, parse, cancel))]
    pub async fn run<T, F>(&self, report_type: &ReportType, mut parse: F, cancel: &CancellationToken) -> Result<Vec<T>>
    where
        F: FnMut(UntypedRecord) -> Result<T>,
    {
        let records = self.run_untyped(report_type, cancel).await?;
        records.into_iter().map(&mut parse).collect()
    }

    /// Run an ad-hoc bulk query and map each record through `parse`.
    #[instrument(skip(self, query, parse, cancel))]
    pub async fn run_query<T, F>(&self, query: &str, mut parse: F, cancel: &CancellationToken) -> Result<Vec<T>>
    where
        F: FnMut(UntypedRecord) -> Result<T>,
    {
        let records: Vec<UntypedRecord> = self.export(query, DEFAULT_LINKAGE_FIELD, cancel).await?;
        records.into_iter().map(&mut parse).collect()
    }

    /// Run a registered report and deserialize both record levels.
    #[instrument(skip(self, cancel))]
    pub async fn run_records<P, C>(
        &self,
        report_type: &ReportType,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReportRecord<P, C>>>
    where
        P: DeserializeOwned,
        C: DeserializeOwned,
    {
        let definition = self.registry.get(report_type)?;
        self.export(&definition.query, &definition.linkage_field, cancel).await
    }

    /// Run a registered report and keep records as raw JSON.
    pub async fn run_untyped(&self, report_type: &ReportType, cancel: &CancellationToken) -> Result<Vec<UntypedRecord>> {
        self.run_records::<Value, Value>(report_type, cancel).await
    }

    async fn export<P, C>(
        &self,
        query: &str,
        linkage_field: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReportRecord<P, C>>>
    where
        P: DeserializeOwned,
        C: DeserializeOwned,
    {
        let submitted = self.submit(query, cancel).await?;
        let finished = self.poll(&submitted.id, cancel).await?;
        validate(&submitted.id, &finished)?;
        self.download_and_parse(&finished, linkage_field, cancel).await
    }

    // =========================================================================
    // Steps
    // =========================================================================

    /// Submit a bulk query.
    ///
    /// The mutation is not retried on transport failure, since a lost
    /// response may still have started an operation. A `THROTTLED` reply
    /// means it never ran, so cost throttling still retries it.
    #[instrument(skip(self, query, cancel))]
    pub async fn submit(&self, query: &str, cancel: &CancellationToken) -> Result<BulkOperation> {
        let variables = json!({ "query": query });
        let data: RunQueryData = self
            .graphql
            .mutate(&run_query_mutation(), Some(&variables), cancel)
            .await?;

        let payload = data
            .bulk_operation_run_query
            .ok_or_else(|| Error::new(ErrorKind::Submission("no payload returned".to_string())))?;

        if !payload.user_errors.is_empty() {
            return Err(Error::new(ErrorKind::Submission(join_user_errors(&payload.user_errors))));
        }

        let operation = payload
            .bulk_operation
            .ok_or_else(|| Error::new(ErrorKind::Submission("no operation returned".to_string())))?;

        if operation.status != BulkOperationStatus::Created {
            return Err(Error::new(ErrorKind::Submission(format!(
                "operation {} was {} on submission",
                operation.id, operation.status
            ))));
        }

        info!(id = %operation.id, "Bulk operation submitted");
        Ok(operation)
    }

    /// Fetch the shop's current bulk query operation.
    pub async fn current_operation(&self, cancel: &CancellationToken) -> Result<Option<BulkOperation>> {
        let data: CurrentOperationData = self
            .graphql
            .query::<_, ()>(&current_operation_query(), None, cancel)
            .await?;
        Ok(data.current_bulk_operation)
    }

    /// Poll until the current operation reaches a terminal status.
    ///
    /// Sleeps before every poll, per the configured schedule.
    #[instrument(skip(self, cancel))]
    pub async fn poll(&self, id: &str, cancel: &CancellationToken) -> Result<BulkOperation> {
        let mut last_status = BulkOperationStatus::Created;

        for poll in 1..=self.schedule.max_polls {
            cancel.check()?;
            cancel.sleep(self.schedule.interval_for(poll)).await?;

            let operation = self.current_operation(cancel).await?.ok_or_else(|| {
                Error::new(ErrorKind::JobMismatch {
                    expected: id.to_string(),
                    actual: None,
                })
            })?;

            debug!(poll, status = %operation.status, objects = ?operation.object_count, "Polled bulk operation");

            if operation.status != last_status {
                info!(id = %operation.id, from = %last_status, to = %operation.status, "Bulk operation status changed");
                last_status = operation.status;
            }

            if operation.status.is_terminal() {
                return Ok(operation);
            }
        }

        warn!(id, polls = self.schedule.max_polls, "Bulk operation did not finish");
        Err(Error::new(ErrorKind::Timeout {
            id: id.to_string(),
            polls: self.schedule.max_polls,
        }))
    }

    /// Stream the result file into records.
    ///
    /// A completed operation with no URL matched no objects.
    #[instrument(skip(self, operation, cancel), fields(id = %operation.id))]
    pub async fn download_and_parse<P, C>(
        &self,
        operation: &BulkOperation,
        linkage_field: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReportRecord<P, C>>>
    where
        P: DeserializeOwned,
        C: DeserializeOwned,
    {
        let Some(url) = operation.url.as_deref() else {
            info!("Bulk operation produced no result file");
            return Ok(Vec::new());
        };

        let mut response = self.graphql.inner().download(url, cancel).await?;
        let mut parser = JsonlParser::<P, C>::with_linkage_field(linkage_field);
        let mut bytes = 0usize;

        while let Some(chunk) = cancel.run(response.chunk()).await? {
            bytes += chunk.len();
            parser.feed(&chunk)?;
        }

        let records = parser.finish()?;
        info!(records = records.len(), bytes, "Parsed bulk operation results");
        Ok(records)
    }

    /// Ask the platform to cancel a running operation.
    #[instrument(skip(self, cancel))]
    pub async fn cancel_operation(&self, id: &str, cancel: &CancellationToken) -> Result<BulkOperation> {
        let variables = json!({ "id": id });
        let data: CancelData = self
            .graphql
            .mutate(&cancel_mutation(), Some(&variables), cancel)
            .await?;

        let payload = data
            .bulk_operation_cancel
            .ok_or_else(|| Error::new(ErrorKind::CancelRejected("no payload returned".to_string())))?;

        if !payload.user_errors.is_empty() {
            return Err(Error::new(ErrorKind::CancelRejected(join_user_errors(&payload.user_errors))));
        }

        let operation = payload
            .bulk_operation
            .ok_or_else(|| Error::new(ErrorKind::CancelRejected("no operation returned".to_string())))?;

        info!(id = %operation.id, status = %operation.status, "Bulk operation cancel requested");
        Ok(operation)
    }
}

/// Check a terminal operation against the submitted id.
///
/// The id is checked first: another client may have replaced the shop's
/// current operation while we were polling.
pub fn validate(submitted_id: &str, operation: &BulkOperation) -> Result<()> {
    if operation.id != submitted_id {
        return Err(Error::new(ErrorKind::JobMismatch {
            expected: submitted_id.to_string(),
            actual: Some(operation.id.clone()),
        }));
    }

    if operation.status != BulkOperationStatus::Completed {
        return Err(Error::new(ErrorKind::ReportGeneration {
            id: operation.id.clone(),
            status: operation.status,
            error_code: operation.error_code.clone(),
            partial_data_url: operation.partial_data_url.clone(),
        }));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use busbar_shop_client::RetryConfig;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const GRAPHQL_PATH: &str = "/admin/api/2024-10/graphql.json";
    const OP_ID: &str = "gid://shopify/BulkOperation/720918";

    const RESULT_FILE: &str = r#"{"id":"gid://shopify/ProductVariant/1","sku":"PV1"}
{"id":"gid://shopify/InventoryLevel/11","location":{"name":"Main"},"__parentId":"gid://shopify/ProductVariant/1"}
{"id":"gid://shopify/InventoryLevel/12","location":{"name":"Annex"},"__parentId":"gid://shopify/ProductVariant/1"}
{"id":"gid://shopify/ProductVariant/2","sku":"PV2"}
{"id":"gid://shopify/InventoryLevel/21","location":{"name":"Main"},"__parentId":"gid://shopify/ProductVariant/2"}
{"id":"gid://shopify/InventoryLevel/22","location":{"name":"Annex"},"__parentId":"gid://shopify/ProductVariant/2"}
"#;

    fn exporter(uri: &str, polls: u32) -> BulkExporter {
        let config = ClientConfig::builder()
            .with_retry(RetryConfig::fixed(2, Duration::from_millis(10)))
            .build();
        BulkExporter::with_config(uri, "shpat_test", config)
            .unwrap()
            .with_poll_schedule(PollSchedule::fixed(Duration::from_millis(5), polls))
    }

    fn operation(id: &str, status: &str, url: Option<String>) -> Value {
        json!({
            "id": id,
            "status": status,
            "errorCode": null,
            "objectCount": "6",
            "url": url,
            "partialDataUrl": null
        })
    }

    fn submitted(status: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "data": {"bulkOperationRunQuery": {
                "bulkOperation": operation(OP_ID, status, None),
                "userErrors": []
            }}
        }))
    }

    fn current(op: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"data": {"currentBulkOperation": op}}))
    }

    async fn mount_submit(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("bulkOperationRunQuery"))
            .respond_with(response)
            .expect(1)
            .mount(server)
            .await;
    }

    #[derive(Debug, Deserialize)]
    struct Variant {
        sku: String,
    }

    #[derive(Debug, Deserialize)]
    struct Level {
        location: Location,
    }

    #[derive(Debug, Deserialize)]
    struct Location {
        name: String,
    }

    #[test]
    fn test_validate_checks_id_before_status() {
        let op: BulkOperation = serde_json::from_value(operation("other", "FAILED", None)).unwrap();
        let err = validate(OP_ID, &op).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::JobMismatch { .. }));
    }

    #[tokio::test]
    async fn test_full_export() {
        let mock_server = MockServer::start().await;
        let result_url = format!("{}/bulk/720918.jsonl", mock_server.uri());
        let polls = Arc::new(AtomicU32::new(0));
        let polls_clone = polls.clone();

        mount_submit(&mock_server, submitted("CREATED")).await;

        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("currentBulkOperation"))
            .respond_with(move |_: &Request| {
                if polls_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                    current(operation(OP_ID, "RUNNING", None))
                } else {
                    current(operation(OP_ID, "COMPLETED", Some(result_url.clone())))
                }
            })
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/bulk/720918.jsonl"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULT_FILE))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut registry = ReportRegistry::new();
        registry.register(
            ReportType::ProductVariantInventory,
            crate::registry::ReportDefinition::new("{ productVariants { edges { node { id } } } }"),
        );

        let records = exporter(&mock_server.uri(), 10)
            .with_registry(registry)
            .run_records::<Variant, Level>(&ReportType::ProductVariantInventory, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].parent.sku, "PV1");
        assert_eq!(records[1].parent.sku, "PV2");
        let locations: Vec<&str> = records[1].children.iter().map(|c| c.location.name.as_str()).collect();
        assert_eq!(locations, vec!["Main", "Annex"]);
    }

    #[tokio::test]
    async fn test_run_maps_records() {
        let mock_server = MockServer::start().await;
        let result_url = format!("{}/bulk/720918.jsonl", mock_server.uri());

        mount_submit(&mock_server, submitted("CREATED")).await;
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("currentBulkOperation"))
            .respond_with(current(operation(OP_ID, "COMPLETED", Some(result_url))))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bulk/720918.jsonl"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULT_FILE))
            .mount(&mock_server)
            .await;

        let counts = exporter(&mock_server.uri(), 3)
            .run(
                &ReportType::ProductVariantInventory,
                |record| Ok((record.parent["sku"].as_str().unwrap_or_default().to_string(), record.children.len())),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(counts, vec![("PV1".to_string(), 2), ("PV2".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_run_query_groups_by_default_linkage() {
        let mock_server = MockServer::start().await;
        let result_url = format!("{}/bulk/720918.jsonl", mock_server.uri());
        let query = "{ productVariants { edges { node { id sku inventoryItem { inventoryLevels { edges { node { id } } } } } } } }";

        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("bulkOperationRunQuery"))
            .and(body_string_contains("inventoryLevels"))
            .respond_with(submitted("CREATED"))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("currentBulkOperation"))
            .respond_with(current(operation(OP_ID, "COMPLETED", Some(result_url))))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bulk/720918.jsonl"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULT_FILE))
            .expect(1)
            .mount(&mock_server)
            .await;

        let records = exporter(&mock_server.uri(), 3)
            .run_query(query, Ok, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].parent["sku"], "PV1");
        assert_eq!(records[1].parent["sku"], "PV2");
        for record in &records {
            assert_eq!(record.children.len(), 2);
            assert!(record.children.iter().all(|child| child.get(DEFAULT_LINKAGE_FIELD).is_none()));
        }
        assert_eq!(records[1].children[1]["id"], "gid://shopify/InventoryLevel/22");
    }

    #[tokio::test]
    async fn test_submit_not_created_never_polls() {
        let mock_server = MockServer::start().await;

        mount_submit(&mock_server, submitted("RUNNING")).await;
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("currentBulkOperation"))
            .respond_with(current(operation(OP_ID, "COMPLETED", None)))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = exporter(&mock_server.uri(), 3)
            .run_untyped(&ReportType::Products, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Submission(_)));
    }

    #[tokio::test]
    async fn test_submit_user_errors() {
        let mock_server = MockServer::start().await;

        mount_submit(
            &mock_server,
            ResponseTemplate::new(200).set_body_json(json!({
                "data": {"bulkOperationRunQuery": {
                    "bulkOperation": null,
                    "userErrors": [{
                        "field": ["query"],
                        "message": "A bulk query operation for this app and shop is already in progress",
                        "code": "OPERATION_IN_PROGRESS"
                    }]
                }}
            })),
        )
        .await;

        let err = exporter(&mock_server.uri(), 3)
            .submit("{ products { edges { node { id } } } }", &CancellationToken::new())
            .await
            .unwrap_err();

        match err.kind {
            ErrorKind::Submission(message) => assert!(message.starts_with("query: A bulk query operation")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_transport_failure_not_retried() {
        let mock_server = MockServer::start().await;
        mount_submit(&mock_server, ResponseTemplate::new(503)).await;

        let err = exporter(&mock_server.uri(), 3)
            .submit("{ products { edges { node { id } } } }", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Client(_)));
        assert_eq!(err.class(), busbar_shop_client::ErrorClass::Transient);
    }

    #[tokio::test]
    async fn test_completed_with_other_id_skips_download() {
        let mock_server = MockServer::start().await;
        let result_url = format!("{}/bulk/other.jsonl", mock_server.uri());

        mount_submit(&mock_server, submitted("CREATED")).await;
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("currentBulkOperation"))
            .respond_with(current(operation(
                "gid://shopify/BulkOperation/999",
                "COMPLETED",
                Some(result_url),
            )))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULT_FILE))
            .expect(0)
            .mount(&mock_server)
            .await;

        let err = exporter(&mock_server.uri(), 3)
            .run_untyped(&ReportType::Products, &CancellationToken::new())
            .await
            .unwrap_err();

        match err.kind {
            ErrorKind::JobMismatch { expected, actual } => {
                assert_eq!(expected, OP_ID);
                assert_eq!(actual.as_deref(), Some("gid://shopify/BulkOperation/999"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_operation_reports_error_code() {
        let mock_server = MockServer::start().await;

        mount_submit(&mock_server, submitted("CREATED")).await;
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("currentBulkOperation"))
            .respond_with(current(json!({
                "id": OP_ID,
                "status": "FAILED",
                "errorCode": "ACCESS_DENIED",
                "url": null,
                "partialDataUrl": "https://storage.example/partial.jsonl"
            })))
            .mount(&mock_server)
            .await;

        let err = exporter(&mock_server.uri(), 3)
            .run_untyped(&ReportType::Orders, &CancellationToken::new())
            .await
            .unwrap_err();

        match err.kind {
            ErrorKind::ReportGeneration {
                status,
                error_code,
                partial_data_url,
                ..
            } => {
                assert_eq!(status, BulkOperationStatus::Failed);
                assert_eq!(error_code.as_deref(), Some("ACCESS_DENIED"));
                assert!(partial_data_url.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("currentBulkOperation"))
            .respond_with(current(operation(OP_ID, "RUNNING", None)))
            .expect(3)
            .mount(&mock_server)
            .await;

        let err = exporter(&mock_server.uri(), 3)
            .poll(OP_ID, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Timeout { polls: 3, .. }));
    }

    #[tokio::test]
    async fn test_poll_null_operation_is_mismatch() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("currentBulkOperation"))
            .respond_with(current(Value::Null))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = exporter(&mock_server.uri(), 3)
            .poll(OP_ID, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::JobMismatch { actual: None, .. }));
    }

    #[tokio::test]
    async fn test_cancel_during_poll_sleep() {
        let mock_server = MockServer::start().await;

        mount_submit(&mock_server, submitted("CREATED")).await;
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("currentBulkOperation"))
            .respond_with(current(operation(OP_ID, "COMPLETED", None)))
            .expect(0)
            .mount(&mock_server)
            .await;

        let exporter = exporter(&mock_server.uri(), 3)
            .with_poll_schedule(PollSchedule::fixed(Duration::from_secs(60), 3));
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let err = exporter
            .run_untyped(&ReportType::Products, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_canceled());
    }

    #[tokio::test]
    async fn test_completed_without_url_is_empty() {
        let mock_server = MockServer::start().await;

        mount_submit(&mock_server, submitted("CREATED")).await;
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("currentBulkOperation"))
            .respond_with(current(operation(OP_ID, "COMPLETED", None)))
            .mount(&mock_server)
            .await;

        let records = exporter(&mock_server.uri(), 3)
            .run_untyped(&ReportType::Customers, &CancellationToken::new())
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_result_line() {
        let mock_server = MockServer::start().await;
        let result_url = format!("{}/bulk/720918.jsonl", mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/bulk/720918.jsonl"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":\"a\"}\n{\"id\":\n"))
            .mount(&mock_server)
            .await;

        let op: BulkOperation = serde_json::from_value(operation(OP_ID, "COMPLETED", Some(result_url))).unwrap();
        let err = exporter(&mock_server.uri(), 3)
            .download_and_parse::<Value, Value>(&op, DEFAULT_LINKAGE_FIELD, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Parse { line_number: 2, .. }));
    }

    #[tokio::test]
    async fn test_cancel_operation() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("bulkOperationCancel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"bulkOperationCancel": {
                    "bulkOperation": operation(OP_ID, "CANCELING", None),
                    "userErrors": []
                }}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let op = exporter(&mock_server.uri(), 3)
            .cancel_operation(OP_ID, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(op.status, BulkOperationStatus::Canceling);
    }

    #[tokio::test]
    async fn test_cancel_operation_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains("bulkOperationCancel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"bulkOperationCancel": {
                    "bulkOperation": null,
                    "userErrors": [{"field": null, "message": "Bulk operation is not running"}]
                }}
            })))
            .mount(&mock_server)
            .await;

        let err = exporter(&mock_server.uri(), 3)
            .cancel_operation(OP_ID, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::CancelRejected(ref m) if m == "Bulk operation is not running"));
    }
}
