//! Feed group domain entity

use chrono::{DateTime, Utc};

/// A user-defined, ordered collection of feeds
#[derive(Debug, Clone, PartialEq)]
pub struct FeedGroup {
    pub id: String,
    pub name: String,
    /// Ordered references to [`Feed::id`](super::Feed) values
    pub feed_ids: Vec<String>,
    pub pinned_position: f64,
    pub pinned_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl FeedGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            feed_ids: Vec::new(),
            pinned_position: 0.0,
            pinned_at: None,
            updated_at: Utc::now(),
            is_deleted: false,
        }
    }

    /// Drops feed references for which `exists` returns false, keeping order
    ///
    /// Returns the number of references removed.
    pub fn retain_feeds(&mut self, exists: impl Fn(&str) -> bool) -> usize {
        let before = self.feed_ids.len();
        self.feed_ids.retain(|id| exists(id));
        before - self.feed_ids.len()
    }
}
