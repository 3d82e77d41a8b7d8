#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/albany/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod attribution;
pub mod export;
pub mod report;
pub mod tables;

pub use attribution::AttributionReport;
pub use export::{ExportError, ExportFormat, Exporter};
pub use report::{Report, ReportBuilder, ReportError};
pub use tables::{AllocationView, PricePivot, correlation_summary_table};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
