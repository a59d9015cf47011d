//! Incremental, feed-scoped refresh
//!
//! The [`LocalSyncCoordinator`] asks a feed source for fresh posts, one feed
//! at a time, and inserts the ones the store does not have yet. The source
//! is the feed fetcher when no account is used and for targeted refreshes of
//! a file-store backend, or the aggregator API for account backends.
//!
//! ## Design Notes
//!
//! - Feeds are refreshed in chunks of concurrent fetches; progress is
//!   reported after each chunk.
//! - A failing feed is logged and skipped. A refresh fails only if every
//!   feed it attempted failed.
//! - Posts published before the feed's `last_clean_up_at` are not
//!   re-inserted, so cleaned-up posts do not come back on the next fetch.
//! - After a successful fetch the feed's refresh interval adapts: shorter
//!   when new posts arrived, longer otherwise.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use feedsync_core::domain::{Feed, Post, PostFlag};
use feedsync_core::ports::{FeedPayload, IFeedFetcher, IRssRepository, PostPayload};

use crate::coordinator::SyncCoordinator;
use crate::state::{SyncState, SyncStateHandle};
use crate::SyncError;

/// Default number of feeds fetched concurrently
pub const DEFAULT_CHUNK_SIZE: usize = 6;

/// Outcome of a refresh pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub feeds_refreshed: u32,
    pub feeds_failed: u32,
    pub new_posts: u64,
}

impl RefreshSummary {
    /// Fails only when feeds were attempted and none succeeded
    pub fn into_result(self) -> Result<Self, SyncError> {
        if self.feeds_failed > 0 && self.feeds_refreshed == 0 {
            Err(SyncError::RefreshFailed(self.feeds_failed))
        } else {
            Ok(self)
        }
    }
}

/// Refreshes feeds from a feed source
pub struct LocalSyncCoordinator {
    rss: Arc<dyn IRssRepository>,
    source: Arc<dyn IFeedFetcher>,
    chunk_size: usize,
    state: SyncStateHandle,
}

impl LocalSyncCoordinator {
    /// Creates a coordinator publishing progress to `state`
    ///
    /// # Arguments
    /// * `chunk_size` - Feeds fetched concurrently, at least 1
    pub fn new(
        rss: Arc<dyn IRssRepository>,
        source: Arc<dyn IFeedFetcher>,
        chunk_size: usize,
        state: SyncStateHandle,
    ) -> Self {
        Self {
            rss,
            source,
            chunk_size: chunk_size.max(1),
            state,
        }
    }

    pub fn state(&self) -> &SyncStateHandle {
        &self.state
    }

    /// Refreshes every feed whose refresh interval has elapsed
    #[tracing::instrument(skip(self))]
    pub async fn refresh_due(&self) -> Result<RefreshSummary, SyncError> {
        let now = Utc::now();
        let feeds: Vec<Feed> = self
            .rss
            .feeds()
            .await?
            .into_iter()
            .filter(|f| f.is_due_for_refresh(now))
            .collect();

        info!(due = feeds.len(), "Refreshing due feeds");
        self.refresh_chunked(&feeds, now).await.into_result()
    }

    /// Refreshes the given feeds regardless of their interval
    ///
    /// Unknown ids are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_feeds(&self, feed_ids: &[String]) -> Result<RefreshSummary, SyncError> {
        let now = Utc::now();
        let mut feeds = Vec::with_capacity(feed_ids.len());
        for id in feed_ids {
            match self.rss.feed(id).await? {
                Some(feed) if !feed.is_deleted => feeds.push(feed),
                _ => debug!(feed_id = %id, "Skipping unknown feed"),
            }
        }

        self.refresh_chunked(&feeds, now).await.into_result()
    }

    async fn refresh_chunked(&self, feeds: &[Feed], now: DateTime<Utc>) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        if feeds.is_empty() {
            return summary;
        }

        let chunks = feeds.len().div_ceil(self.chunk_size);
        for (index, chunk) in feeds.chunks(self.chunk_size).enumerate() {
            let results = join_all(chunk.iter().map(|feed| self.refresh_one(feed, now))).await;

            for (feed, result) in chunk.iter().zip(results) {
                match result {
                    Ok(inserted) => {
                        summary.feeds_refreshed += 1;
                        summary.new_posts += inserted;
                    }
                    Err(e) => {
                        warn!(feed_id = %feed.id, link = %feed.link, error = %e, "Feed refresh failed");
                        summary.feeds_failed += 1;
                    }
                }
            }

            self.state.progress((index + 1) as f32 / chunks as f32);
        }

        info!(
            refreshed = summary.feeds_refreshed,
            failed = summary.feeds_failed,
            new_posts = summary.new_posts,
            "Feed refresh finished"
        );
        summary
    }

    /// Fetches one feed and stores its new posts
    ///
    /// # Returns
    /// The number of inserted posts
    async fn refresh_one(&self, feed: &Feed, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let payload = self
            .source
            .fetch(feed)
            .await
            .with_context(|| format!("Failed to fetch {}", feed.link))?;

        if let Some(filled) = fill_metadata(feed, &payload) {
            self.rss.upsert_feed(&filled).await?;
        }

        let posts: Vec<Post> = payload
            .posts
            .into_iter()
            .filter(|p| feed.last_clean_up_at.map_or(true, |at| p.date >= at))
            .map(|p| post_from_payload(feed, p, now))
            .collect();

        let inserted = self.rss.add_posts(&posts).await?;
        self.rss.update_feed_last_updated_at(&feed.id, now).await?;

        let interval = feed.adjusted_refresh_interval(inserted > 0);
        if interval != feed.refresh_interval {
            self.rss.update_feed_refresh_interval(&feed.id, interval).await?;
        }

        debug!(feed_id = %feed.id, fetched = posts.len(), inserted, "Refreshed feed");
        Ok(inserted)
    }
}

/// Copies the document's name, description, homepage and icon into fields
/// the feed leaves empty
///
/// Returns `None` when nothing changes.
fn fill_metadata(feed: &Feed, payload: &FeedPayload) -> Option<Feed> {
    let mut filled = feed.clone();
    for (field, value) in [
        (&mut filled.name, &payload.name),
        (&mut filled.description, &payload.description),
        (&mut filled.homepage_link, &payload.homepage_link),
        (&mut filled.icon, &payload.icon),
    ] {
        if field.is_empty() && !value.is_empty() {
            *field = value.clone();
        }
    }
    (filled != *feed).then_some(filled)
}

fn post_from_payload(feed: &Feed, payload: PostPayload, now: DateTime<Utc>) -> Post {
    let mut post = Post {
        id: Post::derive_id(&feed.id, &payload.link),
        source_id: feed.id.clone(),
        title: payload.title,
        description: payload.description,
        image_url: payload.image_url,
        post_date: payload.date,
        created_at: now,
        updated_at: now,
        synced_at: now,
        link: payload.link,
        comments_link: payload.comments_link,
        flags: Default::default(),
        raw_content: payload.raw_content,
        html_content: None,
        remote_id: payload.remote_id,
        is_deleted: false,
    };
    post.set_flag(PostFlag::Read, payload.read);
    post.set_flag(PostFlag::Bookmarked, payload.starred);
    post
}

#[async_trait::async_trait]
impl SyncCoordinator for LocalSyncCoordinator {
    fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    async fn pull(&self) -> bool {
        self.state
            .track("pull", async { self.refresh_due().await.map(|_| ()) })
            .await
    }

    async fn pull_feeds(&self, feed_ids: &[String]) -> bool {
        self.state
            .track("pull_feeds", async { self.refresh_feeds(feed_ids).await.map(|_| ()) })
            .await
    }

    async fn pull_feed(&self, feed_id: &str) -> bool {
        let ids = [feed_id.to_string()];
        self.state
            .track("pull_feed", async { self.refresh_feeds(&ids).await.map(|_| ()) })
            .await
    }

    /// Nothing leaves the device without a backend
    async fn push(&self) -> bool {
        true
    }
}
