//! New-article notification
//!
//! After a pull, tells the user how many unread posts arrived. Only posts
//! created locally since the pull started are counted, so posts merged in
//! from another device (which keep their original `created_at`) do not
//! trigger a notification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use feedsync_core::ports::{INotificationService, IRssRepository, ISettingsRepository, Notification};

use crate::state::SyncStateHandle;

/// Sends a notification when a pull brought new unread posts
pub struct NewArticleNotifier {
    rss: Arc<dyn IRssRepository>,
    settings: Arc<dyn ISettingsRepository>,
    notifications: Arc<dyn INotificationService>,
    state: SyncStateHandle,
}

impl NewArticleNotifier {
    pub fn new(
        rss: Arc<dyn IRssRepository>,
        settings: Arc<dyn ISettingsRepository>,
        notifications: Arc<dyn INotificationService>,
        state: SyncStateHandle,
    ) -> Self {
        Self {
            rss,
            settings,
            notifications,
            state,
        }
    }

    /// Notifies about unread posts created after `since`
    ///
    /// Waits for the running sync operation to settle before counting.
    ///
    /// # Returns
    /// The number of new unread posts announced, 0 when notifications are
    /// disabled or nothing arrived
    pub async fn notify_if_new_articles(&self, since: DateTime<Utc>) -> anyhow::Result<u64> {
        if !self.settings.notifications_enabled().await? {
            return Ok(0);
        }

        self.state.wait_until_settled().await;

        let count = self.rss.unread_posts_count_since(Some(since)).await?;
        if count == 0 {
            debug!("No new articles");
            return Ok(0);
        }

        let body = if count == 1 {
            "1 new article".to_string()
        } else {
            format!("{count} new articles")
        };
        self.notifications
            .notify(&Notification::sync("New articles", body))
            .await?;
        debug!(count, "Announced new articles");
        Ok(count)
    }
}
