//! Post domain entity
//!
//! Posts belong to a feed (`source_id`) and carry the per-user reading
//! state as a set of [`PostFlag`]s.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

/// Namespace for ids derived from a feed id and a post link
const POST_NAMESPACE: Uuid = Uuid::from_u128(0x3b8f_41d2_9a6c_4e07_b5d1_7c20_e4a9_0f36);

/// Per-user reading state of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PostFlag {
    Read,
    Bookmarked,
}

impl PostFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostFlag::Read => "Read",
            PostFlag::Bookmarked => "Bookmarked",
        }
    }
}

impl FromStr for PostFlag {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Read" => Ok(PostFlag::Read),
            "Bookmarked" => Ok(PostFlag::Bookmarked),
            other => Err(DomainError::UnknownPostFlag(other.to_string())),
        }
    }
}

/// A single article published by a feed
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    /// Id of the owning feed
    pub source_id: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub post_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Last-write-wins timestamp for merges
    pub updated_at: DateTime<Utc>,
    pub synced_at: DateTime<Utc>,
    pub link: String,
    pub comments_link: Option<String>,
    pub flags: BTreeSet<PostFlag>,
    pub raw_content: Option<String>,
    pub html_content: Option<String>,
    /// Identifier of the entry on an aggregator backend
    pub remote_id: Option<String>,
    pub is_deleted: bool,
}

impl Post {
    /// Derives a stable post id from its feed and link
    ///
    /// Refreshing the same feed twice yields the same ids, so fetched posts
    /// can be inserted idempotently.
    pub fn derive_id(feed_id: &str, link: &str) -> String {
        Uuid::new_v5(&POST_NAMESPACE, format!("{feed_id}\n{link}").as_bytes()).to_string()
    }

    pub fn is_read(&self) -> bool {
        self.flags.contains(&PostFlag::Read)
    }

    pub fn is_bookmarked(&self) -> bool {
        self.flags.contains(&PostFlag::Bookmarked)
    }

    /// Sets or clears a flag
    pub fn set_flag(&mut self, flag: PostFlag, enabled: bool) {
        if enabled {
            self.flags.insert(flag);
        } else {
            self.flags.remove(&flag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_id_is_stable() {
        let a = Post::derive_id("feed-1", "https://example.com/a");
        let b = Post::derive_id("feed-1", "https://example.com/a");
        let c = Post::derive_id("feed-2", "https://example.com/a");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!("Read".parse::<PostFlag>().unwrap(), PostFlag::Read);
        assert_eq!("Bookmarked".parse::<PostFlag>().unwrap(), PostFlag::Bookmarked);
        assert!("Starred".parse::<PostFlag>().is_err());
    }
}
