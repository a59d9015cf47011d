//! Periodic background sync
//!
//! [`PeriodicSync`] runs one [`ScheduledOperation`] every
//! `sync.interval_minutes` while auto-sync is enabled in settings. The
//! default is a push of local changes; a pull worker brings remote state in
//! and, when the coordinator has a notifier, announces new articles.
//!
//! ## Flow
//!
//! ```text
//! interval tick ──→ auto-sync enabled? ──→ spawn pull()/push() ──→ RunOutcome
//!       ↑                                           │
//!       └────────── shutdown token cancels ─────────┘
//! ```
//!
//! Each run is its own task so that a panicking backend is contained and
//! reported instead of taking the worker down. A run cut short by
//! [`PeriodicSync::stop`] counts as a failure but is not reported.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use feedsync_core::ports::{IFailureReporter, ISettingsRepository};

use crate::coordinator::SyncCoordinator;
use crate::SyncError;

const COMPONENT: &str = "periodic_sync";

/// Result of one scheduled run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Auto-sync is disabled
    Skipped,
    Success,
    Failure,
}

/// Coordinator call made on every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduledOperation {
    Pull,
    #[default]
    Push,
}

impl ScheduledOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledOperation::Pull => "pull",
            ScheduledOperation::Push => "push",
        }
    }

    async fn call(self, coordinator: &dyn SyncCoordinator) -> bool {
        match self {
            ScheduledOperation::Pull => coordinator.pull().await,
            ScheduledOperation::Push => coordinator.push().await,
        }
    }
}

/// Runs a coordinator operation on a fixed interval
pub struct PeriodicSync {
    coordinator: Arc<dyn SyncCoordinator>,
    operation: ScheduledOperation,
    settings: Arc<dyn ISettingsRepository>,
    reporter: Arc<dyn IFailureReporter>,
    interval: Duration,
    running: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl PeriodicSync {
    /// Creates a stopped worker that pushes on every tick
    ///
    /// # Arguments
    /// * `interval` - Time between runs; the first run happens one interval
    ///   after [`start`](PeriodicSync::start)
    pub fn new(
        coordinator: Arc<dyn SyncCoordinator>,
        settings: Arc<dyn ISettingsRepository>,
        reporter: Arc<dyn IFailureReporter>,
        interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            operation: ScheduledOperation::default(),
            settings,
            reporter,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Runs `operation` instead of a push
    pub fn with_operation(mut self, operation: ScheduledOperation) -> Self {
        self.operation = operation;
        self
    }

    pub fn operation(&self) -> ScheduledOperation {
        self.operation
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts the worker loop
    ///
    /// A stopped worker cannot be started again; the returned task ends
    /// immediately in that case.
    ///
    /// # Errors
    /// [`SyncError::AlreadyRunning`] if the loop is already running
    pub fn start(&self) -> Result<JoinHandle<()>, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }

        let worker = self.worker();
        let running = self.running.clone();
        let interval = self.interval;

        info!(
            operation = self.operation.as_str(),
            interval_secs = interval.as_secs(),
            "Periodic sync starting"
        );
        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = worker.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let outcome = worker.run().await;
                        debug!(operation = worker.operation.as_str(), ?outcome, "Periodic sync run finished");
                    }
                }
            }

            running.store(false, Ordering::Release);
            info!("Periodic sync stopped");
        }))
    }

    /// Stops the loop and cancels a run in progress
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Performs a single run outside the loop
    pub async fn run_once(&self) -> RunOutcome {
        self.worker().run().await
    }

    fn worker(&self) -> Worker {
        Worker {
            coordinator: self.coordinator.clone(),
            operation: self.operation,
            settings: self.settings.clone(),
            reporter: self.reporter.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

struct Worker {
    coordinator: Arc<dyn SyncCoordinator>,
    operation: ScheduledOperation,
    settings: Arc<dyn ISettingsRepository>,
    reporter: Arc<dyn IFailureReporter>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(&self) -> RunOutcome {
        match self.settings.auto_sync_enabled().await {
            Ok(true) => {}
            Ok(false) => return RunOutcome::Skipped,
            Err(e) => {
                warn!(error = %e, "Failed to read auto-sync setting");
                return RunOutcome::Failure;
            }
        }

        let coordinator = self.coordinator.clone();
        let operation = self.operation;
        let mut task = tokio::spawn(async move { operation.call(coordinator.as_ref()).await });

        let result = tokio::select! {
            result = &mut task => result,
            _ = self.shutdown.cancelled() => {
                task.abort();
                task.await
            }
        };

        self.outcome(result)
    }

    fn outcome(&self, result: Result<bool, JoinError>) -> RunOutcome {
        match result {
            Ok(true) => RunOutcome::Success,
            Ok(false) => RunOutcome::Failure,
            Err(e) if e.is_cancelled() => {
                debug!("Periodic sync run cancelled");
                RunOutcome::Failure
            }
            Err(e) => {
                let message = panic_message(e.into_panic());
                error!(operation = self.operation.as_str(), message = %message, "Periodic sync run panicked");
                self.reporter.report(COMPONENT, &message);
                RunOutcome::Failure
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
