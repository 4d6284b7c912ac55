//! Error types for shop-bulk.

use busbar_shop_client::ErrorClass;

use crate::types::BulkOperationStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create an error with no underlying source.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Classify this error for retry decisions.
    ///
    /// Wrapped client errors keep their own class; bulk errors are fatal.
    pub fn class(&self) -> ErrorClass {
        match self.kind {
            ErrorKind::Client(_) => self
                .source
                .as_deref()
                .and_then(|source| source.downcast_ref::<busbar_shop_client::Error>())
                .map(busbar_shop_client::Error::class)
                .unwrap_or(ErrorClass::Fatal),
            _ => ErrorClass::Fatal,
        }
    }

    /// Returns true if the export was canceled locally.
    pub fn is_canceled(&self) -> bool {
        matches!(self.kind, ErrorKind::Canceled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Transport or GraphQL failure from the shop client.
    #[error("Client error: {0}")]
    Client(String),

    /// The run-query mutation returned no operation or user errors.
    #[error("Bulk operation submission failed: {0}")]
    Submission(String),

    /// The cancel mutation returned user errors.
    #[error("Bulk operation cancel rejected: {0}")]
    CancelRejected(String),

    /// Polling found a different operation than the one submitted.
    #[error("Current bulk operation {} does not match submitted {expected}", actual.as_deref().unwrap_or("(none)"))]
    JobMismatch {
        expected: String,
        actual: Option<String>,
    },

    /// The operation finished without a usable result file.
    #[error("Bulk operation {id} ended {status}{}", error_code.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
    ReportGeneration {
        id: String,
        status: BulkOperationStatus,
        error_code: Option<String>,
        partial_data_url: Option<String>,
    },

    /// The poll schedule ran out before the operation finished.
    #[error("Bulk operation {id} still running after {polls} polls")]
    Timeout { id: String, polls: u32 },

    /// A result file line was not valid for the record types.
    #[error("Parse error on line {line_number}: {message}")]
    Parse {
        line_number: usize,
        line: String,
        message: String,
    },

    /// No definition is registered for the report type.
    #[error("Unknown report: {0}")]
    UnknownReport(String),

    /// The cancellation token fired.
    #[error("Export canceled")]
    Canceled,
}

impl From<busbar_shop_client::Error> for Error {
    fn from(err: busbar_shop_client::Error) -> Self {
        let kind = if err.is_canceled() {
            ErrorKind::Canceled
        } else {
            ErrorKind::Client(err.to_string())
        };
        Error {
            kind,
            source: Some(Box::new(err)),
        }
    }
}
