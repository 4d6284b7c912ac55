//! # busbar-shop-bulk
//!
//! Shopify bulk query exports.
//!
//! ## Features
//!
//! - **Submit** - `bulkOperationRunQuery` with user-error and status checks
//! - **Poll** - tiered schedule on `currentBulkOperation`, cancellable between polls
//! - **Download** - streams the JSONL result file without buffering it whole
//! - **Parse** - rebuilds parent/child records from the flattened lines
//! - **Reports** - a registry of named queries, extendable by the caller
//!
//! ## Example
//!
//! ```rust,ignore
//! use busbar_shop_bulk::{BulkExporter, CancellationToken, ReportType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), busbar_shop_bulk::Error> {
//!     let exporter = BulkExporter::new("https://demo.myshopify.com", "shpat_...")?;
//!     let cancel = CancellationToken::new();
//!
//!     let skus = exporter
//!         .run(
//!             &ReportType::ProductVariantInventory,
//!             |record| Ok(record.parent["sku"].to_string()),
//!             &cancel,
//!         )
//!         .await?;
//!
//!     println!("Exported {} variants", skus.len());
//!     Ok(())
//! }
//! ```

mod error;
mod exporter;
pub mod jsonl;
mod registry;
mod schedule;
mod types;

pub use busbar_shop_client::CancellationToken;
pub use error::{Error, ErrorKind, Result};
pub use exporter::{validate, BulkExporter};
pub use jsonl::{JsonlParser, DEFAULT_LINKAGE_FIELD};
pub use registry::{ReportDefinition, ReportRegistry, ReportType};
pub use schedule::PollSchedule;
pub use types::{BulkOperation, BulkOperationStatus, ReportRecord, UntypedRecord, UserError};
