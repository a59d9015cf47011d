//! Local report storage
//!
//! Manages failure report files in `~/.local/share/feedsync/reports/`.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use feedsync_core::ports::IFailureReporter;

use crate::failure_report::{FailureReport, ReportFilter};

/// Entry in the local report store
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub id: String,
    pub report_type: String,
    pub date: String,
    pub size_bytes: u64,
    pub path: PathBuf,
}

/// Manages the local directory of failure report files.
pub struct LocalReportStore {
    reports_dir: PathBuf,
}

impl LocalReportStore {
    pub fn new(reports_dir: PathBuf) -> Self {
        Self { reports_dir }
    }

    /// Writes `report` into the store, creating the directory if needed.
    pub fn save(&self, report: &FailureReport) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.reports_dir)?;
        let path = self.reports_dir.join(report.file_name());
        std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
        Ok(path)
    }

    /// List all report files, newest first.
    pub fn list(&self) -> anyhow::Result<Vec<ReportEntry>> {
        if !self.reports_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.reports_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|e| e == "json") {
                let stem = path
                    .file_stem()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();

                let (report_type, date, id) = parse_report_filename(&stem);
                let metadata = entry.metadata()?;

                entries.push(ReportEntry {
                    id,
                    report_type,
                    date,
                    size_bytes: metadata.len(),
                    path,
                });
            }
        }

        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }

    /// Read a report by its ID.
    pub fn read(&self, id: &str) -> anyhow::Result<Option<Value>> {
        match self.list()?.into_iter().find(|e| e.id == id) {
            Some(entry) => {
                let content = std::fs::read_to_string(&entry.path)?;
                Ok(Some(serde_json::from_str(&content)?))
            }
            None => Ok(None),
        }
    }

    /// Delete a report by its ID.
    pub fn delete(&self, id: &str) -> anyhow::Result<bool> {
        match self.list()?.into_iter().find(|e| e.id == id) {
            Some(entry) => {
                std::fs::remove_file(&entry.path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete all reports.
    pub fn delete_all(&self) -> anyhow::Result<u32> {
        let mut count = 0;
        for entry in self.list()? {
            if std::fs::remove_file(&entry.path).is_ok() {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }
}

/// Parse a report filename like `failure-20260207-a1b2c3d4` into (type, date, id).
fn parse_report_filename(stem: &str) -> (String, String, String) {
    let parts: Vec<&str> = stem.splitn(3, '-').collect();
    match parts.len() {
        3 => (
            parts[0].to_string(),
            parts[1].to_string(),
            parts[2].to_string(),
        ),
        2 => (parts[0].to_string(), parts[1].to_string(), stem.to_string()),
        _ => ("unknown".to_string(), String::new(), stem.to_string()),
    }
}

// ============================================================================
// IFailureReporter adapter
// ============================================================================

/// Writes reported failures into a [`LocalReportStore`]
///
/// Reporting never fails the caller: write errors are logged.
pub struct FileFailureReporter {
    store: LocalReportStore,
    enabled: bool,
}

impl FileFailureReporter {
    pub fn new(store: LocalReportStore, enabled: bool) -> Self {
        Self { store, enabled }
    }
}

impl IFailureReporter for FileFailureReporter {
    fn report(&self, component: &str, message: &str) {
        if !self.enabled {
            return;
        }
        if !ReportFilter::should_report(message) {
            debug!(component, "Transient failure, not reported");
            return;
        }

        let report = FailureReport::new(component, message);
        match self.store.save(&report) {
            Ok(path) => debug!(path = %path.display(), "Failure report saved"),
            Err(e) => warn!(error = %e, "Failed to save failure report"),
        }
    }
}
