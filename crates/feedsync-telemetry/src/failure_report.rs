//! Failure report generation
//!
//! Captures unexpected failures of background sync work, such as a panicking
//! periodic run, so they can be inspected after the fact.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A structured failure report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub id: String,
    pub timestamp: String,
    pub version: String,
    /// Component that failed, e.g. `periodic_sync`
    pub component: String,
    pub message: String,
    pub os: String,
    pub arch: String,
}

impl FailureReport {
    /// Create a new report for `component`.
    pub fn new(component: &str, message: &str) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            component: component.to_string(),
            message: message.to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// File name under which the report is stored: `failure-YYYYMMDD-<id>.json`
    pub fn file_name(&self) -> String {
        let date = chrono::DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.format("%Y%m%d").to_string())
            .unwrap_or_else(|_| Utc::now().format("%Y%m%d").to_string());
        format!("failure-{date}-{}.json", self.id)
    }
}

/// Filters which failures are worth reporting.
pub struct ReportFilter;

impl ReportFilter {
    /// Returns false for transient network conditions that resolve on the
    /// next run.
    pub fn should_report(message: &str) -> bool {
        let lower = message.to_lowercase();

        if lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("connection refused")
            || lower.contains("too many requests")
            || lower.contains("429")
        {
            return false;
        }

        true
    }
}
