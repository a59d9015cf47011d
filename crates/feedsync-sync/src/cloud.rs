//! Full-snapshot sync against a file cloud store
//!
//! The [`CloudSyncService`] downloads the remote snapshot, merges it with a
//! snapshot of the local store, applies the result locally and uploads it.
//!
//! ## Sync Flow
//!
//! 1. **Download**: fetch and decode the remote snapshot; a missing file is
//!    an empty snapshot
//! 2. **Merge**: last-write-wins merge with the local library, then drop
//!    posts covered by read-post cleanup
//! 3. **Apply**: write the merged library in one transaction and run the
//!    cleanups that arrived from the remote side
//! 4. **Upload**: encode and replace the remote snapshot
//!
//! ## Design Notes
//!
//! - Runs for the same service are serialized by a per-service mutex, so a
//!   manual sync and a scheduled one never race on the remote write.
//! - Nothing is written locally until the merge has been computed in
//!   memory. A failed upload leaves local state ahead of the remote copy
//!   until the next successful sync.
//! - Only a confirmed missing file counts as an empty snapshot. A failed
//!   download aborts the sync, so a transient error cannot overwrite remote
//!   data with local data only.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use feedsync_core::config::SyncConfig;
use feedsync_core::domain::{ServiceType, SyncStatus};
use feedsync_core::ports::{
    FileDownload, IFileCloudServiceProvider, IRssRepository, ISettingsRepository,
    IUserRepository,
};

use crate::merge::{clean_up_instants, filter_posts, merge, MergeOptions};
use crate::snapshot::SyncData;
use crate::SyncError;

/// Downloads, merges, applies and re-uploads the reading-state snapshot
pub struct CloudSyncService {
    rss: Arc<dyn IRssRepository>,
    users: Arc<dyn IUserRepository>,
    settings: Arc<dyn ISettingsRepository>,
    snapshot_path: String,
    clock_skew_tolerance: Duration,
    in_flight: DashMap<ServiceType, Arc<Mutex<()>>>,
}

impl CloudSyncService {
    pub fn new(
        rss: Arc<dyn IRssRepository>,
        users: Arc<dyn IUserRepository>,
        settings: Arc<dyn ISettingsRepository>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            rss,
            users,
            settings,
            snapshot_path: config.snapshot_path.clone(),
            clock_skew_tolerance: Duration::hours(config.clock_skew_tolerance_hours),
            in_flight: DashMap::new(),
        }
    }

    /// Path of the snapshot file on the remote store
    pub fn snapshot_path(&self) -> &str {
        &self.snapshot_path
    }

    /// Runs one full sync with `provider`
    ///
    /// # Returns
    /// `true` only if the merged snapshot was applied locally and uploaded.
    /// Failures are logged and recorded as the last sync status.
    #[tracing::instrument(skip(self, provider), fields(service = %provider.service_type()))]
    pub async fn sync(&self, provider: &dyn IFileCloudServiceProvider) -> bool {
        let service = provider.service_type();
        let lock = self.in_flight.entry(service).or_default().clone();
        let _guard = lock.lock().await;

        let now = Utc::now();
        let result = self.run(provider, now).await;

        let status = match &result {
            Ok(()) => {
                info!(provider = provider.name(), "Cloud sync complete");
                SyncStatus::Success
            }
            Err(e) => {
                error!(provider = provider.name(), error = %e, "Cloud sync failed");
                SyncStatus::Failure
            }
        };
        if let Err(e) = self.settings.set_last_sync_status(status).await {
            warn!(error = %e, "Failed to record sync status");
        }

        result.is_ok()
    }

    async fn run(
        &self,
        provider: &dyn IFileCloudServiceProvider,
        now: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let service = provider.service_type();
        if !provider.is_signed_in_immediate().await {
            return Err(SyncError::NotSignedIn(provider.name().to_string()));
        }

        let remote = self.download(provider).await?;

        let library = self.rss.library().await?;
        let user = self.users.user(service).await?;
        let local = SyncData::from_library(&library, user.as_ref());
        debug!(
            local_feeds = local.feeds.len(),
            local_posts = local.posts.len(),
            remote_feeds = remote.feeds.len(),
            remote_posts = remote.posts.len(),
            "Merging snapshots"
        );

        let options = MergeOptions::new(now, self.clock_skew_tolerance);
        let mut merged = merge(local, remote, &options);
        let clean_ups = clean_up_instants(&merged);
        merged.posts = filter_posts(merged.posts, &clean_ups);

        let merged_library = merged.to_library(&library, now);
        self.rss.apply_library(&merged_library).await?;

        let mut clean_up_updates = Vec::new();
        for feed in &merged_library.feeds {
            let Some(clean_up_at) = feed.last_clean_up_at else {
                continue;
            };
            let local_clean_up = library.feed(&feed.id).and_then(|f| f.last_clean_up_at);
            if local_clean_up.map_or(true, |local| clean_up_at > local) {
                let deleted = self.rss.delete_read_posts_before(&feed.id, clean_up_at).await?;
                debug!(feed_id = %feed.id, deleted, "Applied remote read-post cleanup");
                clean_up_updates.push((feed.id.clone(), clean_up_at));
            }
        }
        if !clean_up_updates.is_empty() {
            self.rss
                .update_feeds_last_clean_up_at(&clean_up_updates)
                .await?;
        }

        let bytes = merged.encode()?;
        let size = bytes.len();
        if !provider.upload(&self.snapshot_path, bytes).await {
            return Err(SyncError::UploadFailed(self.snapshot_path.clone()));
        }
        debug!(path = %self.snapshot_path, size, "Uploaded merged snapshot");

        self.settings.set_last_synced_at(now).await?;
        Ok(())
    }

    async fn download(&self, provider: &dyn IFileCloudServiceProvider) -> Result<SyncData, SyncError> {
        match provider.fetch_file(&self.snapshot_path).await {
            FileDownload::Found(bytes) => Ok(SyncData::decode(&bytes)?),
            FileDownload::NotFound => {
                info!(path = %self.snapshot_path, "No remote snapshot yet, starting from empty");
                Ok(SyncData::default())
            }
            FileDownload::Failed => Err(SyncError::DownloadFailed(self.snapshot_path.clone())),
        }
    }
}
