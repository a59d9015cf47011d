//! Settings repository port
//!
//! Sync-related preferences and bookkeeping values that outlive a process.

use chrono::{DateTime, Utc};

use crate::domain::SyncStatus;

#[async_trait::async_trait]
pub trait ISettingsRepository: Send + Sync {
    /// Whether the periodic background sync may run
    async fn auto_sync_enabled(&self) -> anyhow::Result<bool>;

    async fn set_auto_sync_enabled(&self, enabled: bool) -> anyhow::Result<()>;

    /// Whether new-article notifications may be shown
    async fn notifications_enabled(&self) -> anyhow::Result<bool>;

    async fn set_notifications_enabled(&self, enabled: bool) -> anyhow::Result<()>;

    /// When the last successful full sync finished
    async fn last_synced_at(&self) -> anyhow::Result<Option<DateTime<Utc>>>;

    async fn set_last_synced_at(&self, at: DateTime<Utc>) -> anyhow::Result<()>;

    /// Outcome of the last full sync attempt
    async fn last_sync_status(&self) -> anyhow::Result<Option<SyncStatus>>;

    async fn set_last_sync_status(&self, status: SyncStatus) -> anyhow::Result<()>;
}
