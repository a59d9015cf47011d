//! The complete local reading state as one value
//!
//! A repository exports its state as a [`Library`] and applies a merged
//! [`Library`] back in a single transaction, so a merge never writes
//! field by field.

use std::collections::BTreeSet;

use super::{BlockedWord, Feed, FeedGroup, Post};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Library {
    pub feeds: Vec<Feed>,
    pub groups: Vec<FeedGroup>,
    pub posts: Vec<Post>,
    pub blocked_words: Vec<BlockedWord>,
}

impl Library {
    /// Ids of all bookmarked posts
    pub fn bookmarks(&self) -> BTreeSet<String> {
        self.posts
            .iter()
            .filter(|p| p.is_bookmarked())
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn feed(&self, id: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.id == id)
    }
}
