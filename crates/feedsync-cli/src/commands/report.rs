//! Report command - Manage failure reports
//!
//! Provides the `feedsync report` CLI command with subcommands:
//! - `list`: Show all saved reports
//! - `view <id>`: Display a specific report
//! - `delete`: Remove reports from local storage

use anyhow::Result;
use clap::Subcommand;

use feedsync_core::config::Config;
use feedsync_telemetry::LocalReportStore;

use crate::GlobalOpts;

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// List saved failure reports
    List,
    /// View a specific report
    View {
        /// Report ID or filename fragment
        id: String,
    },
    /// Delete reports from local storage
    Delete {
        /// Specific report ID to delete
        id: Option<String>,
        /// Delete all reports
        #[arg(long)]
        all: bool,
    },
}

impl ReportCommand {
    pub async fn execute(&self, opts: &GlobalOpts) -> Result<()> {
        let fmt = opts.format.formatter();
        let config = Config::load_or_default(&opts.config_path);
        let store = LocalReportStore::new(config.telemetry.reports_dir);

        match self {
            ReportCommand::List => {
                let entries = store.list()?;

                if opts.format.is_json() {
                    let json: Vec<serde_json::Value> = entries
                        .iter()
                        .map(|e| {
                            serde_json::json!({
                                "id": e.id,
                                "type": e.report_type,
                                "date": e.date,
                                "size_bytes": e.size_bytes,
                            })
                        })
                        .collect();
                    fmt.print_json(&serde_json::json!(json));
                    return Ok(());
                }

                if entries.is_empty() {
                    fmt.info("No reports found.");
                    return Ok(());
                }

                println!("{:<12} {:<8} {:<12} {:>10}", "ID", "Type", "Date", "Size");
                println!("{}", "-".repeat(46));
                for entry in &entries {
                    println!(
                        "{:<12} {:<8} {:<12} {:>10}",
                        entry.id,
                        entry.report_type,
                        entry.date,
                        format_size(entry.size_bytes),
                    );
                }
                println!();
                println!("Total: {} report(s)", entries.len());
            }

            ReportCommand::View { id } => match store.read(id)? {
                Some(value) if opts.format.is_json() => fmt.print_json(&value),
                Some(value) => match value.as_object() {
                    Some(fields) => {
                        for (key, val) in fields {
                            match val {
                                serde_json::Value::String(s) => println!("{key}: {s}"),
                                other => println!("{key}: {other}"),
                            }
                        }
                    }
                    None => println!("{value}"),
                },
                None => fmt.error(&format!("Report '{id}' not found")),
            },

            ReportCommand::Delete { id, all } => {
                if *all {
                    let count = store.delete_all()?;
                    fmt.success(&format!("Deleted {count} report(s)"));
                } else if let Some(report_id) = id {
                    if store.delete(report_id)? {
                        fmt.success(&format!("Deleted report '{report_id}'"));
                    } else {
                        fmt.error(&format!("Report '{report_id}' not found"));
                    }
                } else {
                    fmt.error("Specify a report ID or use --all");
                }
            }
        }

        Ok(())
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
