//! Feed domain entity
//!
//! A feed is a subscribed source of posts. Besides the user-visible
//! metadata it carries the bookkeeping used by incremental refresh
//! (`last_updated_at`, `refresh_interval`) and by read-post cleanup
//! (`last_clean_up_at`).

use chrono::{DateTime, Duration, Utc};

/// Lower bound for an adaptive refresh interval
pub const MIN_REFRESH_INTERVAL_MINUTES: i64 = 15;

/// Upper bound for an adaptive refresh interval
pub const MAX_REFRESH_INTERVAL_MINUTES: i64 = 24 * 60;

/// Refresh interval given to newly subscribed feeds
pub const DEFAULT_REFRESH_INTERVAL_MINUTES: i64 = 60;

/// Interval shrink factor after a refresh that brought new posts
const NEW_CONTENT_FACTOR: f64 = 0.8;

/// Interval growth factor after a refresh that brought nothing new
const NO_CONTENT_FACTOR: f64 = 1.2;

/// A subscribed feed
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    /// URL of the feed document
    pub link: String,
    /// URL of the website publishing the feed
    pub homepage_link: String,
    pub created_at: DateTime<Utc>,
    pub pinned_position: f64,
    pub pinned_at: Option<DateTime<Utc>>,
    /// Read posts older than this instant are removed
    pub last_clean_up_at: Option<DateTime<Utc>>,
    /// Last successful refresh; also the last-write-wins timestamp during merges
    pub last_updated_at: Option<DateTime<Utc>>,
    pub refresh_interval: Duration,
    pub always_fetch_source_article: bool,
    /// Identifier of the feed on an aggregator backend
    pub remote_id: Option<String>,
    pub is_deleted: bool,
}

impl Feed {
    /// Creates a feed with default bookkeeping values
    pub fn new(id: impl Into<String>, name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: String::new(),
            description: String::new(),
            link: link.into(),
            homepage_link: String::new(),
            created_at: Utc::now(),
            pinned_position: 0.0,
            pinned_at: None,
            last_clean_up_at: None,
            last_updated_at: None,
            refresh_interval: Duration::minutes(DEFAULT_REFRESH_INTERVAL_MINUTES),
            always_fetch_source_article: false,
            remote_id: None,
            is_deleted: false,
        }
    }

    /// Returns true if the feed was never refreshed or its interval has elapsed
    pub fn is_due_for_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.last_updated_at {
            None => true,
            Some(last) => now - last >= self.refresh_interval,
        }
    }

    /// Computes the next refresh interval after a refresh
    ///
    /// Feeds that keep publishing are polled more often, quiet feeds less
    /// often, bounded by [`MIN_REFRESH_INTERVAL_MINUTES`] and
    /// [`MAX_REFRESH_INTERVAL_MINUTES`].
    pub fn adjusted_refresh_interval(&self, has_new_content: bool) -> Duration {
        let current = self.refresh_interval.num_milliseconds() as f64;
        if has_new_content {
            let scaled = Duration::milliseconds((current * NEW_CONTENT_FACTOR) as i64);
            scaled.max(Duration::minutes(MIN_REFRESH_INTERVAL_MINUTES))
        } else {
            let scaled = Duration::milliseconds((current * NO_CONTENT_FACTOR) as i64);
            scaled.min(Duration::minutes(MAX_REFRESH_INTERVAL_MINUTES))
        }
    }
}
