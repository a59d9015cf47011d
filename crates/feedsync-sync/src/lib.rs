//! FeedSync Sync - Reading-state synchronization engine
//!
//! Provides:
//! - The `SyncData` snapshot format with tolerant decoding and legacy migration
//! - Last-write-wins merge of a local and a remote snapshot
//! - Full-snapshot sync against a file cloud store
//! - Incremental, feed-scoped refresh against a feed source
//! - Per-backend coordinators publishing an observable [`SyncState`]
//! - Retention-based cleanup of read posts
//!
//! ## Modules
//!
//! - [`snapshot`] - Wire entities, encode/decode, conversion to and from the domain
//! - [`merge`] - Pure merge and post filtering
//! - [`cleanup`] - `ReadPostCleaner`, deletes expired read posts and stamps the cutoff
//! - [`cloud`] - `CloudSyncService`, download-merge-apply-upload with single-flight
//! - [`local`] - `LocalSyncCoordinator`, chunked incremental refresh
//! - [`state`] - `SyncState` machine and its watch-backed handle
//! - [`coordinator`] - `SyncCoordinator` contract and backend selection
//! - [`notifier`] - New-article notification after a pull
//! - [`scheduler`] - Periodic background pull or push

pub mod cleanup;
pub mod cloud;
pub mod coordinator;
pub mod local;
pub mod merge;
pub mod notifier;
pub mod scheduler;
pub mod snapshot;
pub mod state;

#[cfg(test)]
mod testing;

pub use cleanup::{CleanUpSummary, ReadPostCleaner};
pub use cloud::CloudSyncService;
pub use coordinator::{
    AccountSyncCoordinator, Backend, DefaultSyncCoordinator, FileStoreSyncCoordinator,
    SyncCoordinator, SyncDependencies,
};
pub use local::{LocalSyncCoordinator, RefreshSummary};
pub use notifier::NewArticleNotifier;
pub use scheduler::{PeriodicSync, RunOutcome, ScheduledOperation};
pub use snapshot::SyncData;
pub use state::{SyncState, SyncStateHandle};

use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The backend has no usable login
    #[error("Not signed in to {0}")]
    NotSignedIn(String),

    /// The snapshot could not be encoded or decoded
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The remote snapshot exists but could not be downloaded
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// A snapshot sync with the file store did not complete
    #[error("Cloud sync with {0} failed")]
    CloudSyncFailed(String),

    /// The merged snapshot could not be uploaded
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Every feed of a refresh failed to fetch
    #[error("All {0} feeds failed to refresh")]
    RefreshFailed(u32),

    /// The periodic worker is already running
    #[error("Periodic sync already running")]
    AlreadyRunning,

    /// A repository or source port failed
    #[error(transparent)]
    Port(#[from] anyhow::Error),
}
