//! SyncData - the snapshot exchanged with a file cloud store
//!
//! A snapshot is a single camelCase JSON document holding the complete
//! reading state. Timestamps are epoch milliseconds.
//!
//! ## Schema drift
//!
//! Decoding never rejects a payload for its version. Missing fields take
//! their zero value (`""`, `false`, `null`, `[]`), explicit `null` is
//! accepted where a default exists, unknown post flags are skipped, and
//! `blockedWords` written as plain strings (version 1) are upgraded to
//! entities with a name-based id. After decoding, `version` is always
//! [`CURRENT_VERSION`].
//!
//! ## Local-only fields
//!
//! `Feed::created_at`, `Feed::refresh_interval` and the aggregator ids are
//! not part of the wire format. [`SyncData::to_library`] takes them from the
//! matching local entity, or falls back to defaults for entities that only
//! exist remotely.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use feedsync_core::domain::feed::DEFAULT_REFRESH_INTERVAL_MINUTES;
use feedsync_core::domain::{
    name_based_uuid, BlockedWord, Feed, FeedGroup, Library, Post, PostFlag, ServiceType, User,
};

/// Version written by this client
pub const CURRENT_VERSION: u32 = 2;

// ============================================================================
// Wire entities
// ============================================================================

/// The complete snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncData {
    pub version: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub feeds: Vec<FeedSyncEntity>,
    #[serde(deserialize_with = "null_as_default")]
    pub groups: Vec<GroupSyncEntity>,
    /// Ids of bookmarked posts
    #[serde(deserialize_with = "null_as_default")]
    pub bookmarks: BTreeSet<String>,
    #[serde(deserialize_with = "deserialize_blocked_words")]
    pub blocked_words: Vec<BlockedWordSyncEntity>,
    #[serde(deserialize_with = "null_as_default")]
    pub posts: Vec<PostSyncEntity>,
    pub user: Option<UserSyncEntity>,
}

impl Default for SyncData {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            feeds: Vec::new(),
            groups: Vec::new(),
            bookmarks: BTreeSet::new(),
            blocked_words: Vec::new(),
            posts: Vec::new(),
            user: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedSyncEntity {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub icon: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    pub link: String,
    #[serde(deserialize_with = "null_as_default")]
    pub homepage_link: String,
    #[serde(deserialize_with = "null_as_default")]
    pub pinned_position: f64,
    pub pinned_at: Option<i64>,
    pub last_clean_up_at: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub always_fetch_source_article: bool,
    pub last_updated_at: Option<i64>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupSyncEntity {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub feed_ids: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub pinned_position: f64,
    pub pinned_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockedWordSyncEntity {
    pub id: String,
    pub content: String,
    pub is_deleted: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: i64,
}

impl BlockedWordSyncEntity {
    /// Upgrades a version 1 blocked word stored as a plain string
    ///
    /// The id depends only on the content, so upgrading the same word
    /// twice yields the same entity.
    pub fn from_legacy(content: &str) -> Self {
        Self {
            id: name_based_uuid(content).to_string(),
            content: content.to_string(),
            is_deleted: false,
            updated_at: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostSyncEntity {
    pub id: String,
    pub source_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    pub image_url: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub post_date: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub created_at: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub synced_at: i64,
    pub link: String,
    pub comments_link: Option<String>,
    #[serde(deserialize_with = "deserialize_flags")]
    pub flags: BTreeSet<PostFlag>,
    pub is_deleted: bool,
    pub raw_content: Option<String>,
    pub html_content: Option<String>,
}

impl PostSyncEntity {
    pub fn is_read(&self) -> bool {
        self.flags.contains(&PostFlag::Read)
    }

    pub fn is_bookmarked(&self) -> bool {
        self.flags.contains(&PostFlag::Bookmarked)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSyncEntity {
    pub id: String,
    pub name: String,
    pub profile_id: Option<String>,
    pub email: String,
    pub token: String,
    pub refresh_token: Option<String>,
    pub server_url: Option<String>,
}

// ============================================================================
// Tolerant deserializers
// ============================================================================

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A blocked word in either the entity or the legacy string encoding
#[derive(Deserialize)]
#[serde(untagged)]
enum BlockedWordRecord {
    Legacy(String),
    Entity(BlockedWordSyncEntity),
}

fn deserialize_blocked_words<'de, D>(deserializer: D) -> Result<Vec<BlockedWordSyncEntity>, D::Error>
where
    D: Deserializer<'de>,
{
    let records = Option::<Vec<BlockedWordRecord>>::deserialize(deserializer)?.unwrap_or_default();

    let mut seen = HashSet::new();
    let mut words = Vec::with_capacity(records.len());
    for record in records {
        let word = match record {
            BlockedWordRecord::Legacy(content) => BlockedWordSyncEntity::from_legacy(&content),
            BlockedWordRecord::Entity(entity) => entity,
        };
        if seen.insert(word.id.clone()) {
            words.push(word);
        }
    }
    Ok(words)
}

fn deserialize_flags<'de, D>(deserializer: D) -> Result<BTreeSet<PostFlag>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(names
        .iter()
        .filter_map(|name| match name.parse() {
            Ok(flag) => Some(flag),
            Err(_) => {
                debug!(flag = %name, "Ignoring unknown post flag");
                None
            }
        })
        .collect())
}

// ============================================================================
// Encoding
// ============================================================================

impl SyncData {
    /// Decodes a snapshot of any version, upgrading it to [`CURRENT_VERSION`]
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let mut data: SyncData = serde_json::from_slice(bytes)?;
        if data.version != CURRENT_VERSION {
            debug!(from = data.version, to = CURRENT_VERSION, "Upgrading snapshot version");
        }
        data.version = CURRENT_VERSION;
        Ok(data)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// ============================================================================
// Domain conversion
// ============================================================================

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

impl From<&Feed> for FeedSyncEntity {
    fn from(feed: &Feed) -> Self {
        Self {
            id: feed.id.clone(),
            name: feed.name.clone(),
            icon: feed.icon.clone(),
            description: feed.description.clone(),
            link: feed.link.clone(),
            homepage_link: feed.homepage_link.clone(),
            pinned_position: feed.pinned_position,
            pinned_at: feed.pinned_at.map(millis),
            last_clean_up_at: feed.last_clean_up_at.map(millis),
            always_fetch_source_article: feed.always_fetch_source_article,
            last_updated_at: feed.last_updated_at.map(millis),
            is_deleted: feed.is_deleted,
        }
    }
}

impl FeedSyncEntity {
    /// Converts to a domain feed, keeping local-only fields of `local`
    pub fn to_feed(&self, local: Option<&Feed>, now: DateTime<Utc>) -> Feed {
        Feed {
            id: self.id.clone(),
            name: self.name.clone(),
            icon: self.icon.clone(),
            description: self.description.clone(),
            link: self.link.clone(),
            homepage_link: self.homepage_link.clone(),
            created_at: local.map(|f| f.created_at).unwrap_or(now),
            pinned_position: self.pinned_position,
            pinned_at: self.pinned_at.map(datetime),
            last_clean_up_at: self.last_clean_up_at.map(datetime),
            last_updated_at: self.last_updated_at.map(datetime),
            refresh_interval: local
                .map(|f| f.refresh_interval)
                .unwrap_or_else(|| Duration::minutes(DEFAULT_REFRESH_INTERVAL_MINUTES)),
            always_fetch_source_article: self.always_fetch_source_article,
            remote_id: local.and_then(|f| f.remote_id.clone()),
            is_deleted: self.is_deleted,
        }
    }
}

impl From<&FeedGroup> for GroupSyncEntity {
    fn from(group: &FeedGroup) -> Self {
        Self {
            id: group.id.clone(),
            name: group.name.clone(),
            feed_ids: group.feed_ids.clone(),
            pinned_position: group.pinned_position,
            pinned_at: group.pinned_at.map(millis),
            updated_at: Some(millis(group.updated_at)),
            is_deleted: group.is_deleted,
        }
    }
}

impl GroupSyncEntity {
    /// Converts to a domain group; a missing `updatedAt` becomes `now`
    pub fn to_group(&self, now: DateTime<Utc>) -> FeedGroup {
        FeedGroup {
            id: self.id.clone(),
            name: self.name.clone(),
            feed_ids: self.feed_ids.clone(),
            pinned_position: self.pinned_position,
            pinned_at: self.pinned_at.map(datetime),
            updated_at: self.updated_at.map(datetime).unwrap_or(now),
            is_deleted: self.is_deleted,
        }
    }
}

impl From<&BlockedWord> for BlockedWordSyncEntity {
    fn from(word: &BlockedWord) -> Self {
        Self {
            id: word.id.clone(),
            content: word.content.clone(),
            is_deleted: word.is_deleted,
            updated_at: millis(word.updated_at),
        }
    }
}

impl From<&BlockedWordSyncEntity> for BlockedWord {
    fn from(entity: &BlockedWordSyncEntity) -> Self {
        BlockedWord {
            id: entity.id.clone(),
            content: entity.content.clone(),
            is_deleted: entity.is_deleted,
            updated_at: datetime(entity.updated_at),
        }
    }
}

impl From<&Post> for PostSyncEntity {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            source_id: post.source_id.clone(),
            title: post.title.clone(),
            description: post.description.clone(),
            image_url: post.image_url.clone(),
            post_date: millis(post.post_date),
            created_at: millis(post.created_at),
            updated_at: millis(post.updated_at),
            synced_at: millis(post.synced_at),
            link: post.link.clone(),
            comments_link: post.comments_link.clone(),
            flags: post.flags.clone(),
            is_deleted: post.is_deleted,
            raw_content: post.raw_content.clone(),
            html_content: post.html_content.clone(),
        }
    }
}

impl PostSyncEntity {
    /// Converts to a domain post, keeping the aggregator id of `local`
    pub fn to_post(&self, local: Option<&Post>) -> Post {
        Post {
            id: self.id.clone(),
            source_id: self.source_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            image_url: self.image_url.clone(),
            post_date: datetime(self.post_date),
            created_at: datetime(self.created_at),
            updated_at: datetime(self.updated_at),
            synced_at: datetime(self.synced_at),
            link: self.link.clone(),
            comments_link: self.comments_link.clone(),
            flags: self.flags.clone(),
            raw_content: self.raw_content.clone(),
            html_content: self.html_content.clone(),
            remote_id: local.and_then(|p| p.remote_id.clone()),
            is_deleted: self.is_deleted,
        }
    }
}

impl From<&User> for UserSyncEntity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            profile_id: user.profile_id.clone(),
            email: user.email.clone(),
            token: user.token.clone(),
            refresh_token: user.refresh_token.clone(),
            server_url: user.server_url.clone(),
        }
    }
}

impl UserSyncEntity {
    pub fn to_user(&self, service: ServiceType) -> User {
        User {
            service,
            id: self.id.clone(),
            name: self.name.clone(),
            profile_id: self.profile_id.clone(),
            email: self.email.clone(),
            token: self.token.clone(),
            refresh_token: self.refresh_token.clone(),
            server_url: self.server_url.clone(),
        }
    }
}

impl SyncData {
    /// Builds a snapshot of the local library and the signed-in user
    pub fn from_library(library: &Library, user: Option<&User>) -> Self {
        Self {
            version: CURRENT_VERSION,
            feeds: library.feeds.iter().map(FeedSyncEntity::from).collect(),
            groups: library.groups.iter().map(GroupSyncEntity::from).collect(),
            bookmarks: library.bookmarks(),
            blocked_words: library
                .blocked_words
                .iter()
                .map(BlockedWordSyncEntity::from)
                .collect(),
            posts: library.posts.iter().map(PostSyncEntity::from).collect(),
            user: user.map(UserSyncEntity::from),
        }
    }

    /// Converts the snapshot into a library to apply over `local`
    pub fn to_library(&self, local: &Library, now: DateTime<Utc>) -> Library {
        let local_posts: HashMap<&str, &Post> =
            local.posts.iter().map(|p| (p.id.as_str(), p)).collect();

        Library {
            feeds: self
                .feeds
                .iter()
                .map(|f| f.to_feed(local.feed(&f.id), now))
                .collect(),
            groups: self.groups.iter().map(|g| g.to_group(now)).collect(),
            posts: self
                .posts
                .iter()
                .map(|p| p.to_post(local_posts.get(p.id.as_str()).copied()))
                .collect(),
            blocked_words: self.blocked_words.iter().map(BlockedWord::from).collect(),
        }
    }
}
