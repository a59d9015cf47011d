//! Feed source ports
//!
//! Incremental refresh pulls fresh posts for one feed at a time, either by
//! fetching the feed document directly ([`IFeedFetcher`]) or by asking an
//! aggregator account ([`IAggregatorApi`]). Parsing feed documents is the
//! adapter's concern; the sync engine only sees [`FeedPayload`].

use chrono::{DateTime, Utc};

use crate::domain::Feed;

/// Feed metadata and posts as returned by a source
#[derive(Debug, Clone, Default)]
pub struct FeedPayload {
    pub name: String,
    pub description: String,
    pub homepage_link: String,
    pub icon: String,
    pub posts: Vec<PostPayload>,
}

/// A post as returned by a source
#[derive(Debug, Clone)]
pub struct PostPayload {
    /// Aggregator entry id, when the source has one
    pub remote_id: Option<String>,
    pub link: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub comments_link: Option<String>,
    pub date: DateTime<Utc>,
    pub raw_content: Option<String>,
    /// Read state reported by the source
    pub read: bool,
    /// Bookmark state reported by the source
    pub starred: bool,
}

/// Fetches a feed document and returns its posts
#[async_trait::async_trait]
pub trait IFeedFetcher: Send + Sync {
    async fn fetch(&self, feed: &Feed) -> anyhow::Result<FeedPayload>;
}

/// A feed subscription held by an aggregator account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub remote_id: String,
    pub title: String,
    pub feed_url: String,
    pub site_url: String,
}

/// Account-based RSS aggregator
#[async_trait::async_trait]
pub trait IAggregatorApi: Send + Sync {
    /// Lists the account's subscriptions
    async fn subscriptions(&self) -> anyhow::Result<Vec<Subscription>>;

    /// Returns recent entries of a subscribed feed
    ///
    /// `feed.remote_id` must be set.
    async fn feed_entries(&self, feed: &Feed) -> anyhow::Result<FeedPayload>;

    /// Marks entries as read or unread on the aggregator
    async fn update_entries_status(&self, entry_ids: &[String], read: bool)
        -> anyhow::Result<()>;
}
