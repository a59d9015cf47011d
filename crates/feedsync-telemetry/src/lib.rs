//! FeedSync Telemetry - Local failure reports
//!
//! Provides:
//! - `FailureReport`: Structured report of an unexpected background failure
//! - `ReportFilter`: Decides which failures are worth a report
//! - `LocalReportStore`: File-based report management
//! - `FileFailureReporter`: `IFailureReporter` adapter writing into the store

pub mod failure_report;
pub mod store;

pub use failure_report::{FailureReport, ReportFilter};
pub use store::{FileFailureReporter, LocalReportStore, ReportEntry};
