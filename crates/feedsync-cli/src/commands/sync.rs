//! Sync command - Pull and push reading state
//!
//! Provides the `feedsync sync` CLI subcommands:
//! - `pull`: Brings local state up to date with the active backend
//! - `push`: Sends local changes to the active backend
//! - `feed <id>...`: Refreshes the given feeds only
//! - `watch`: Pulls and cleans up read posts once, then pulls and pushes on the
//!   configured interval until Ctrl-C

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Subcommand;
use tokio::sync::watch;
use tracing::{info, warn};

use feedsync_core::ports::{IFailureReporter, ISettingsRepository};
use feedsync_sync::{PeriodicSync, ReadPostCleaner, ScheduledOperation, SyncCoordinator, SyncState};

use crate::context::AppContext;
use crate::output::OutputFormatter;
use crate::GlobalOpts;

#[derive(Debug, Subcommand)]
pub enum SyncCommand {
    /// Pull remote state and refresh due feeds
    Pull,
    /// Push local changes
    Push,
    /// Refresh specific feeds
    Feed {
        /// Feed ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Keep pulling and pushing on the configured interval until interrupted
    Watch,
}

impl SyncCommand {
    pub async fn execute(&self, opts: &GlobalOpts) -> Result<()> {
        let fmt = opts.format.formatter();
        let ctx = AppContext::open(&opts.config_path).await?;
        let coordinator = ctx.coordinator().await?;

        let progress = if opts.format.is_json() {
            None
        } else {
            Some(tokio::spawn(show_progress(coordinator.sync_state())))
        };

        let result = match self {
            SyncCommand::Pull => {
                let ok = coordinator.pull().await;
                report(&coordinator, ok, "Pull complete", &*fmt)
            }
            SyncCommand::Push => {
                let ok = coordinator.push().await;
                report(&coordinator, ok, "Push complete", &*fmt)
            }
            SyncCommand::Feed { ids } => {
                let ok = coordinator.pull_feeds(ids).await;
                report(&coordinator, ok, "Feeds refreshed", &*fmt)
            }
            SyncCommand::Watch => watch_loop(&ctx, coordinator, &*fmt).await,
        };

        if let Some(task) = progress {
            task.abort();
        }
        result
    }
}

/// Prints a line per progress step of the running operation
async fn show_progress(mut rx: watch::Receiver<SyncState>) {
    let mut last = -1;
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        if let SyncState::InProgress { progress } = state {
            let percent = (progress * 100.0).round() as i32;
            if percent != last {
                println!("  ... {percent}%");
                last = percent;
            }
        } else {
            last = -1;
        }
    }
}

fn report(
    coordinator: &dyn SyncCoordinator,
    ok: bool,
    message: &str,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    if ok {
        fmt.success(message);
        return Ok(());
    }
    match &*coordinator.sync_state().borrow() {
        SyncState::Failed { reason } => bail!("{reason}"),
        _ => bail!("Sync failed"),
    }
}

async fn watch_loop(
    ctx: &AppContext,
    coordinator: impl SyncCoordinator + 'static,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    let coordinator: Arc<dyn SyncCoordinator> = Arc::new(coordinator);

    if coordinator.pull().await {
        fmt.success("Initial pull complete");
    } else {
        fmt.error("Initial pull failed; retrying on the next run");
    }

    let cleaner = ReadPostCleaner::new(ctx.store.clone(), ctx.config.sync.read_post_retention_days);
    if let Err(e) = cleaner.clean_up(chrono::Utc::now()).await {
        warn!(error = %e, "Read-post cleanup failed");
    }

    let interval = Duration::from_secs(ctx.config.sync.interval_minutes.max(1) * 60);
    let settings: Arc<dyn ISettingsRepository> = ctx.store.clone();
    let reporter: Arc<dyn IFailureReporter> = Arc::new(ctx.failure_reporter());
    let workers = [ScheduledOperation::Pull, ScheduledOperation::Push].map(|operation| {
        PeriodicSync::new(coordinator.clone(), settings.clone(), reporter.clone(), interval)
            .with_operation(operation)
    });

    let mut handles = Vec::with_capacity(workers.len());
    for worker in &workers {
        handles.push(worker.start()?);
    }
    fmt.info(&format!(
        "Pulling and pushing every {} minute(s); press Ctrl-C to stop",
        interval.as_secs() / 60
    ));

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, stopping periodic sync");
    for worker in &workers {
        worker.stop();
    }
    for handle in handles {
        handle.await?;
    }

    fmt.success("Stopped");
    Ok(())
}
