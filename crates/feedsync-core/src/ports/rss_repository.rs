//! RSS repository port (driven/secondary port)
//!
//! This module defines the interface to the local reading-state store.
//! The full-snapshot merge exports and applies whole [`Library`] values;
//! incremental refresh works on individual feeds and posts.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - [`IRssRepository::apply_library`] must be atomic: either the whole
//!   merged state is written or nothing is.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Feed, Library, Post};

#[async_trait::async_trait]
pub trait IRssRepository: Send + Sync {
    /// Exports feeds, groups, posts and blocked words
    async fn library(&self) -> anyhow::Result<Library>;

    /// Writes a merged library in one transaction
    ///
    /// Every entity in `library` is inserted or replaced. Entities absent
    /// from `library` are left untouched.
    async fn apply_library(&self, library: &Library) -> anyhow::Result<()>;

    /// Returns all feeds that are not deleted
    async fn feeds(&self) -> anyhow::Result<Vec<Feed>>;

    /// Returns a single feed by id
    async fn feed(&self, id: &str) -> anyhow::Result<Option<Feed>>;

    /// Returns the feed whose aggregator-side id is `remote_id`
    async fn feed_by_remote_id(&self, remote_id: &str) -> anyhow::Result<Option<Feed>>;

    /// Inserts or replaces a feed
    async fn upsert_feed(&self, feed: &Feed) -> anyhow::Result<()>;

    async fn update_feed_last_updated_at(
        &self,
        feed_id: &str,
        last_updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    async fn update_feed_refresh_interval(
        &self,
        feed_id: &str,
        refresh_interval: Duration,
    ) -> anyhow::Result<()>;

    /// Sets `last_clean_up_at` for each `(feed_id, instant)` pair
    async fn update_feeds_last_clean_up_at(
        &self,
        updates: &[(String, DateTime<Utc>)],
    ) -> anyhow::Result<()>;

    /// Deletes read, non-bookmarked posts of `feed_id` published before `before`
    ///
    /// # Returns
    /// The number of deleted posts
    async fn delete_read_posts_before(
        &self,
        feed_id: &str,
        before: DateTime<Utc>,
    ) -> anyhow::Result<u64>;

    /// Inserts posts that are not stored yet, leaving existing ones untouched
    ///
    /// # Returns
    /// The number of newly inserted posts
    async fn add_posts(&self, posts: &[Post]) -> anyhow::Result<u64>;

    async fn posts_count_for_feed(&self, feed_id: &str) -> anyhow::Result<u64>;

    /// Counts unread posts created after `since` (all unread posts when `None`)
    async fn unread_posts_count_since(&self, since: Option<DateTime<Utc>>)
        -> anyhow::Result<u64>;

    /// Returns posts with an aggregator id whose `updated_at` is after `since`
    async fn remote_posts_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Post>>;

    /// Removes group references to feeds that no longer exist
    ///
    /// # Returns
    /// The number of references removed
    async fn prune_group_feed_ids(&self) -> anyhow::Result<u64>;
}
