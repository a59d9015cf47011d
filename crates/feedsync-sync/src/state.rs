//! Observable sync state
//!
//! ```text
//! Idle ──→ InProgress(p) ──→ Complete ──→ Idle
//!               │                 ↑
//!               └──→ Failed ──────┘ (acknowledge or next operation)
//! ```
//!
//! Every operation enters `InProgress` when it starts, from any state. A
//! terminal state stays visible until it is acknowledged or the next
//! operation begins, so observers that subscribe late still see the outcome.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::SyncError;

/// Progress of the current or last sync operation
#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    Idle,
    /// Running; `progress` is in `0.0..=1.0`
    InProgress { progress: f32 },
    Complete,
    Failed { reason: String },
}

impl SyncState {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, SyncState::InProgress { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Complete | SyncState::Failed { .. })
    }
}

/// Shared writer of a [`SyncState`]
///
/// Clones publish to the same channel.
#[derive(Debug, Clone)]
pub struct SyncStateHandle {
    tx: Arc<watch::Sender<SyncState>>,
}

impl Default for SyncStateHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStateHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SyncState::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> SyncState {
        self.tx.borrow().clone()
    }

    /// Enters `InProgress(0.0)`
    pub fn begin(&self) {
        debug!("Sync operation started");
        self.tx.send_replace(SyncState::InProgress { progress: 0.0 });
    }

    /// Updates the progress of the running operation
    ///
    /// Ignored when no operation is running.
    pub fn progress(&self, progress: f32) {
        let progress = progress.clamp(0.0, 1.0);
        self.tx.send_if_modified(|state| match state {
            SyncState::InProgress { progress: current } if *current != progress => {
                *current = progress;
                true
            }
            _ => false,
        });
    }

    pub fn complete(&self) {
        debug!("Sync operation complete");
        self.tx.send_replace(SyncState::Complete);
    }

    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(reason = %reason, "Sync operation failed");
        self.tx.send_replace(SyncState::Failed { reason });
    }

    /// Runs `work` as one operation: `InProgress`, then the matching terminal state
    ///
    /// If the returned future is dropped before `work` finishes, or `work`
    /// panics, the state becomes `Failed`.
    ///
    /// # Returns
    /// `true` if `work` succeeded
    pub async fn track<F>(&self, operation: &str, work: F) -> bool
    where
        F: Future<Output = Result<(), SyncError>>,
    {
        self.begin();
        let guard = Unfinished {
            handle: self,
            operation,
        };
        let result = work.await;
        std::mem::forget(guard);

        match result {
            Ok(()) => {
                self.complete();
                true
            }
            Err(e) => {
                warn!(operation, error = %e, "Sync operation failed");
                self.fail(e.to_string());
                false
            }
        }
    }

    /// Returns a terminal state to `Idle`
    pub fn acknowledge(&self) {
        self.tx.send_if_modified(|state| {
            if state.is_terminal() {
                *state = SyncState::Idle;
                true
            } else {
                false
            }
        });
    }

    /// Waits until no operation is running
    pub async fn wait_until_settled(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting
        let _ = rx.wait_for(|state| !state.is_in_progress()).await;
    }
}

/// Fails the running operation when dropped; forgotten once it finishes
struct Unfinished<'a> {
    handle: &'a SyncStateHandle,
    operation: &'a str,
}

impl Drop for Unfinished<'_> {
    fn drop(&mut self) {
        let reason = if std::thread::panicking() {
            format!("{} panicked", self.operation)
        } else {
            format!("{} cancelled", self.operation)
        };
        warn!(operation = self.operation, reason = %reason, "Sync operation interrupted");
        self.handle.fail(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_initial_state_is_idle() {
        let handle = SyncStateHandle::new();
        assert_eq!(handle.current(), SyncState::Idle);
    }

    #[test]
    fn test_full_cycle() {
        let handle = SyncStateHandle::new();

        handle.begin();
        assert_eq!(handle.current(), SyncState::InProgress { progress: 0.0 });

        handle.progress(0.5);
        assert_eq!(handle.current(), SyncState::InProgress { progress: 0.5 });

        handle.complete();
        assert_eq!(handle.current(), SyncState::Complete);

        handle.acknowledge();
        assert_eq!(handle.current(), SyncState::Idle);
    }

    #[test]
    fn test_failed_state_persists_until_next_operation() {
        let handle = SyncStateHandle::new();
        handle.begin();
        handle.fail("network down");

        assert_eq!(
            handle.current(),
            SyncState::Failed {
                reason: "network down".into()
            }
        );

        handle.begin();
        assert!(handle.current().is_in_progress());
    }

    #[test]
    fn test_progress_ignored_when_idle() {
        let handle = SyncStateHandle::new();
        handle.progress(0.7);
        assert_eq!(handle.current(), SyncState::Idle);
    }

    #[test]
    fn test_progress_is_clamped() {
        let handle = SyncStateHandle::new();
        handle.begin();
        handle.progress(3.0);
        assert_eq!(handle.current(), SyncState::InProgress { progress: 1.0 });
    }

    #[test]
    fn test_acknowledge_does_not_interrupt_running_operation() {
        let handle = SyncStateHandle::new();
        handle.begin();
        handle.acknowledge();
        assert!(handle.current().is_in_progress());
    }

    #[test]
    fn test_clones_share_state() {
        let handle = SyncStateHandle::new();
        let rx = handle.subscribe();
        handle.clone().begin();
        assert!(rx.borrow().is_in_progress());
    }

    #[tokio::test]
    async fn test_track_publishes_outcome() {
        let handle = SyncStateHandle::new();

        assert!(handle.track("ok", async { Ok::<(), SyncError>(()) }).await);
        assert_eq!(handle.current(), SyncState::Complete);

        let failed = handle
            .track("upload", async { Err(SyncError::UploadFailed("/x.json".into())) })
            .await;
        assert!(!failed);
        assert_eq!(
            handle.current(),
            SyncState::Failed {
                reason: "Upload failed: /x.json".into()
            }
        );
    }

    #[tokio::test]
    async fn test_wait_until_settled() {
        let handle = SyncStateHandle::new();
        handle.begin();

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_until_settled().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        handle.complete();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish once settled")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_operation_is_marked_failed() {
        let handle = SyncStateHandle::new();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            handle.track("push", std::future::pending::<Result<(), SyncError>>()),
        )
        .await;
        assert!(cancelled.is_err());

        assert_eq!(
            handle.current(),
            SyncState::Failed {
                reason: "push cancelled".into()
            }
        );
        tokio::time::timeout(Duration::from_millis(100), handle.wait_until_settled())
            .await
            .expect("cancelled operation must not block waiters");
    }

    #[tokio::test]
    async fn test_panicking_operation_is_marked_failed() {
        let handle = SyncStateHandle::new();

        let task = {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle
                    .track("pull", async {
                        if true {
                            panic!("boom");
                        }
                        Ok::<(), SyncError>(())
                    })
                    .await
            })
        };
        assert!(task.await.unwrap_err().is_panic());

        assert_eq!(
            handle.current(),
            SyncState::Failed {
                reason: "pull panicked".into()
            }
        );
    }

    #[tokio::test]
    async fn test_wait_until_settled_returns_immediately_when_idle() {
        let handle = SyncStateHandle::new();
        tokio::time::timeout(Duration::from_millis(100), handle.wait_until_settled())
            .await
            .expect("should not block");
    }
}
