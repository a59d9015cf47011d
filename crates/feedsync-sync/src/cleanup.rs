//! Read-post cleanup
//!
//! Deletes read, non-bookmarked posts older than the retention period and
//! stamps each live feed's `last_clean_up_at` with the cutoff. The stamp
//! travels in the next snapshot, so other devices drop the same posts when
//! they merge it.
//!
//! The stamp only moves forward. A feed already cleaned up to a later
//! instant keeps its stamp and its posts.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use feedsync_core::ports::IRssRepository;

use crate::SyncError;

/// What one cleanup removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanUpSummary {
    /// Feeds whose `last_clean_up_at` was advanced
    pub feeds: u32,
    pub deleted_posts: u64,
}

/// Applies the read-post retention period to the local store
pub struct ReadPostCleaner {
    rss: Arc<dyn IRssRepository>,
    retention: Option<Duration>,
}

impl ReadPostCleaner {
    /// # Arguments
    /// * `retention_days` - Age after which read posts are deleted; `0`
    ///   disables the cleanup
    pub fn new(rss: Arc<dyn IRssRepository>, retention_days: u32) -> Self {
        Self {
            rss,
            retention: (retention_days > 0).then(|| Duration::days(i64::from(retention_days))),
        }
    }

    /// Instant before which read posts are deleted, `None` when disabled
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.retention.map(|retention| now - retention)
    }

    /// Deletes expired read posts and records the cutoff on every feed
    ///
    /// # Errors
    /// [`SyncError::Port`] when the store fails; feeds processed before the
    /// failure keep their deletions but no stamp is written
    pub async fn clean_up(&self, now: DateTime<Utc>) -> Result<CleanUpSummary, SyncError> {
        let Some(cutoff) = self.cutoff(now) else {
            debug!("Read-post retention disabled");
            return Ok(CleanUpSummary::default());
        };

        let mut summary = CleanUpSummary::default();
        let mut updates = Vec::new();
        for feed in self.rss.feeds().await? {
            if feed.is_deleted || feed.last_clean_up_at.is_some_and(|at| at >= cutoff) {
                continue;
            }
            let deleted = self.rss.delete_read_posts_before(&feed.id, cutoff).await?;
            debug!(feed_id = %feed.id, deleted, "Cleaned up read posts");
            summary.deleted_posts += deleted;
            updates.push((feed.id, cutoff));
        }

        if !updates.is_empty() {
            self.rss.update_feeds_last_clean_up_at(&updates).await?;
        }
        summary.feeds = updates.len() as u32;

        info!(
            cutoff = %cutoff,
            feeds = summary.feeds,
            deleted = summary.deleted_posts,
            "Read-post cleanup finished"
        );
        Ok(summary)
    }
}
