//! Types for bulk operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a count that the API sends as a string (`"42"`) or a number.
pub(crate) fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        String(String),
    }

    Option::<Count>::deserialize(deserializer)?
        .map(|count| match count {
            Count::Number(n) => Ok(n),
            Count::String(s) => s.parse().map_err(serde::de::Error::custom),
        })
        .transpose()
}

/// Bulk operation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkOperationStatus {
    /// Accepted, not yet started
    Created,
    /// In progress
    Running,
    /// Finished; results are available
    Completed,
    /// Canceled by a client
    Canceled,
    /// Cancellation requested, not yet acknowledged
    Canceling,
    /// Took too long and was stopped by the platform
    Expired,
    /// Failed; see the error code
    Failed,
}

impl BulkOperationStatus {
    /// Whether polling should stop at this status.
    ///
    /// `Canceling` counts as terminal: the operation will never complete.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BulkOperationStatus::Created | BulkOperationStatus::Running)
    }

    /// Check if the operation completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, BulkOperationStatus::Completed)
    }

    /// The API string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOperationStatus::Created => "CREATED",
            BulkOperationStatus::Running => "RUNNING",
            BulkOperationStatus::Completed => "COMPLETED",
            BulkOperationStatus::Canceled => "CANCELED",
            BulkOperationStatus::Canceling => "CANCELING",
            BulkOperationStatus::Expired => "EXPIRED",
            BulkOperationStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for BulkOperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bulk operation as reported by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperation {
    pub id: String,
    pub status: BulkOperationStatus,
    #[serde(default)]
    pub error_code: Option<String>,
    /// Result file; `None` until completion, and when there were no objects.
    #[serde(default)]
    pub url: Option<String>,
    /// Results gathered before a failure.
    #[serde(default)]
    pub partial_data_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub object_count: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A validation error returned by a bulk mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) if !field.is_empty() => write!(f, "{}: {}", field.join("."), self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Payload shared by `bulkOperationRunQuery` and `bulkOperationCancel`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OperationPayload {
    pub bulk_operation: Option<BulkOperation>,
    #[serde(default)]
    pub user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunQueryData {
    pub bulk_operation_run_query: Option<OperationPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CurrentOperationData {
    pub current_bulk_operation: Option<BulkOperation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CancelData {
    pub bulk_operation_cancel: Option<OperationPayload>,
}

/// One parent object and the child lines that followed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRecord<P, C> {
    pub parent: P,
    pub children: Vec<C>,
}

/// A record with both levels left as raw JSON.
pub type UntypedRecord = ReportRecord<serde_json::Value, serde_json::Value>;
