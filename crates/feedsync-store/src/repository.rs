//! SQLite implementation of the repository ports
//!
//! This module provides the concrete SQLite-based implementation of the
//! `IRssRepository`, `IUserRepository` and `ISettingsRepository` ports
//! defined in feedsync-core. It handles domain type mapping and SQL query
//! construction.
//!
//! ## Type Mapping
//!
//! | Domain Type        | SQL Type | Strategy                                     |
//! |--------------------|----------|----------------------------------------------|
//! | DateTime<Utc>      | INTEGER  | Milliseconds since the Unix epoch            |
//! | chrono::Duration   | INTEGER  | Milliseconds                                 |
//! | bool               | INTEGER  | 0 / 1                                        |
//! | ServiceType        | TEXT     | `as_str()` / `FromStr`                       |
//! | PostFlag set       | INTEGER  | One column per flag (`is_read`, `is_bookmarked`) |
//! | FeedGroup.feed_ids | TABLE    | `group_feeds` rows ordered by `position`     |

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tokio::sync::watch;

use feedsync_core::domain::{
    BlockedWord, Feed, FeedGroup, Library, Post, PostFlag, ServiceType, SyncStatus, User,
};
use feedsync_core::ports::{IRssRepository, ISettingsRepository, IUserRepository};

use crate::StoreError;

const SETTING_AUTO_SYNC: &str = "auto_sync_enabled";
const SETTING_NOTIFICATIONS: &str = "notifications_enabled";
const SETTING_LAST_SYNCED_AT: &str = "last_synced_at";
const SETTING_LAST_SYNC_STATUS: &str = "last_sync_status";

/// SQLite-backed store implementing all repository ports
///
/// User writes are broadcast through a watch channel so sign-in state can
/// be observed without polling.
pub struct SqliteStore {
    pool: SqlitePool,
    users_tx: watch::Sender<Vec<User>>,
}

impl SqliteStore {
    /// Creates a store over `pool`, loading the current users for observers
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        let users = load_users(&pool).await?;
        let (users_tx, _) = watch::channel(users);
        Ok(Self { pool, users_tx })
    }

    /// Reloads users and notifies observers
    async fn publish_users(&self) -> Result<(), StoreError> {
        let users = load_users(&self.pool).await?;
        self.users_tx.send_replace(users);
        Ok(())
    }

    async fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        tracing::trace!(key, value, "Saved setting");
        Ok(())
    }

    async fn bool_setting(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        Ok(self
            .setting(key)
            .await?
            .map(|v| v == "true")
            .unwrap_or(default))
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn optional_millis(dt: &Option<DateTime<Utc>>) -> Option<i64> {
    dt.as_ref().map(millis)
}

fn datetime_from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::SerializationError(format!("Timestamp out of range: {}", ms)))
}

fn optional_datetime(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, StoreError> {
    ms.map(datetime_from_millis).transpose()
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn feed_from_row(row: &SqliteRow) -> Result<Feed, StoreError> {
    Ok(Feed {
        id: row.get("id"),
        name: row.get("name"),
        icon: row.get("icon"),
        description: row.get("description"),
        link: row.get("link"),
        homepage_link: row.get("homepage_link"),
        created_at: datetime_from_millis(row.get("created_at"))?,
        pinned_position: row.get("pinned_position"),
        pinned_at: optional_datetime(row.get("pinned_at"))?,
        last_clean_up_at: optional_datetime(row.get("last_clean_up_at"))?,
        last_updated_at: optional_datetime(row.get("last_updated_at"))?,
        refresh_interval: Duration::milliseconds(row.get("refresh_interval_ms")),
        always_fetch_source_article: row.get("always_fetch_source_article"),
        remote_id: row.get("remote_id"),
        is_deleted: row.get("is_deleted"),
    })
}

fn post_from_row(row: &SqliteRow) -> Result<Post, StoreError> {
    let mut flags = BTreeSet::new();
    if row.get::<bool, _>("is_read") {
        flags.insert(PostFlag::Read);
    }
    if row.get::<bool, _>("is_bookmarked") {
        flags.insert(PostFlag::Bookmarked);
    }

    Ok(Post {
        id: row.get("id"),
        source_id: row.get("source_id"),
        title: row.get("title"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        post_date: datetime_from_millis(row.get("post_date"))?,
        created_at: datetime_from_millis(row.get("created_at"))?,
        updated_at: datetime_from_millis(row.get("updated_at"))?,
        synced_at: datetime_from_millis(row.get("synced_at"))?,
        link: row.get("link"),
        comments_link: row.get("comments_link"),
        flags,
        raw_content: row.get("raw_content"),
        html_content: row.get("html_content"),
        remote_id: row.get("remote_id"),
        is_deleted: row.get("is_deleted"),
    })
}

fn blocked_word_from_row(row: &SqliteRow) -> Result<BlockedWord, StoreError> {
    Ok(BlockedWord {
        id: row.get("id"),
        content: row.get("content"),
        is_deleted: row.get("is_deleted"),
        updated_at: datetime_from_millis(row.get("updated_at"))?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    let service: String = row.get("service");
    let service = service
        .parse::<ServiceType>()
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;

    Ok(User {
        service,
        id: row.get("id"),
        name: row.get("name"),
        profile_id: row.get("profile_id"),
        email: row.get("email"),
        token: row.get("token"),
        refresh_token: row.get("refresh_token"),
        server_url: row.get("server_url"),
    })
}

async fn load_users(pool: &SqlitePool) -> Result<Vec<User>, StoreError> {
    let rows = sqlx::query("SELECT * FROM users ORDER BY service")
        .fetch_all(pool)
        .await?;
    rows.iter().map(user_from_row).collect()
}

// ============================================================================
// Write helpers shared by single writes and transactions
// ============================================================================

async fn write_feed(conn: &mut SqliteConnection, feed: &Feed) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT OR REPLACE INTO feeds \
         (id, name, icon, description, link, homepage_link, created_at, pinned_position, \
          pinned_at, last_clean_up_at, last_updated_at, refresh_interval_ms, \
          always_fetch_source_article, remote_id, is_deleted) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&feed.id)
    .bind(&feed.name)
    .bind(&feed.icon)
    .bind(&feed.description)
    .bind(&feed.link)
    .bind(&feed.homepage_link)
    .bind(millis(&feed.created_at))
    .bind(feed.pinned_position)
    .bind(optional_millis(&feed.pinned_at))
    .bind(optional_millis(&feed.last_clean_up_at))
    .bind(optional_millis(&feed.last_updated_at))
    .bind(feed.refresh_interval.num_milliseconds())
    .bind(feed.always_fetch_source_article)
    .bind(&feed.remote_id)
    .bind(feed.is_deleted)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn write_group(conn: &mut SqliteConnection, group: &FeedGroup) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO feed_groups (id, name, pinned_position, pinned_at, updated_at, is_deleted) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, \
         pinned_position = excluded.pinned_position, pinned_at = excluded.pinned_at, \
         updated_at = excluded.updated_at, is_deleted = excluded.is_deleted",
    )
    .bind(&group.id)
    .bind(&group.name)
    .bind(group.pinned_position)
    .bind(optional_millis(&group.pinned_at))
    .bind(millis(&group.updated_at))
    .bind(group.is_deleted)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM group_feeds WHERE group_id = ?")
        .bind(&group.id)
        .execute(&mut *conn)
        .await?;

    for (position, feed_id) in group.feed_ids.iter().enumerate() {
        sqlx::query(
            "INSERT OR IGNORE INTO group_feeds (group_id, feed_id, position) VALUES (?, ?, ?)",
        )
        .bind(&group.id)
        .bind(feed_id)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Writes a post; `replace` overwrites an existing row, otherwise it is kept
async fn write_post(
    conn: &mut SqliteConnection,
    post: &Post,
    replace: bool,
) -> Result<u64, sqlx::Error> {
    let verb = if replace {
        "INSERT OR REPLACE"
    } else {
        "INSERT OR IGNORE"
    };
    let sql = format!(
        "{verb} INTO posts \
         (id, source_id, title, description, image_url, post_date, created_at, updated_at, \
          synced_at, link, comments_link, is_read, is_bookmarked, raw_content, html_content, \
          remote_id, is_deleted) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );

    let result = sqlx::query(&sql)
        .bind(&post.id)
        .bind(&post.source_id)
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.image_url)
        .bind(millis(&post.post_date))
        .bind(millis(&post.created_at))
        .bind(millis(&post.updated_at))
        .bind(millis(&post.synced_at))
        .bind(&post.link)
        .bind(&post.comments_link)
        .bind(post.is_read())
        .bind(post.is_bookmarked())
        .bind(&post.raw_content)
        .bind(&post.html_content)
        .bind(&post.remote_id)
        .bind(post.is_deleted)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

async fn write_blocked_word(
    conn: &mut SqliteConnection,
    word: &BlockedWord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT OR REPLACE INTO blocked_words (id, content, is_deleted, updated_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(&word.id)
    .bind(&word.content)
    .bind(word.is_deleted)
    .bind(millis(&word.updated_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// ============================================================================
// IRssRepository
// ============================================================================

#[async_trait::async_trait]
impl IRssRepository for SqliteStore {
    async fn library(&self) -> anyhow::Result<Library> {
        let feeds = sqlx::query("SELECT * FROM feeds ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(feed_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let mut feed_ids_by_group: HashMap<String, Vec<String>> = HashMap::new();
        for row in sqlx::query("SELECT group_id, feed_id FROM group_feeds ORDER BY group_id, position")
            .fetch_all(&self.pool)
            .await?
        {
            feed_ids_by_group
                .entry(row.get("group_id"))
                .or_default()
                .push(row.get("feed_id"));
        }

        let mut groups = Vec::new();
        for row in sqlx::query("SELECT * FROM feed_groups ORDER BY id")
            .fetch_all(&self.pool)
            .await?
        {
            let id: String = row.get("id");
            groups.push(FeedGroup {
                feed_ids: feed_ids_by_group.remove(&id).unwrap_or_default(),
                id,
                name: row.get("name"),
                pinned_position: row.get("pinned_position"),
                pinned_at: optional_datetime(row.get("pinned_at"))?,
                updated_at: datetime_from_millis(row.get("updated_at"))?,
                is_deleted: row.get("is_deleted"),
            });
        }

        let posts = sqlx::query("SELECT * FROM posts ORDER BY post_date DESC, id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let blocked_words = sqlx::query("SELECT * FROM blocked_words ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(blocked_word_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Library {
            feeds,
            groups,
            posts,
            blocked_words,
        })
    }

    async fn apply_library(&self, library: &Library) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for feed in &library.feeds {
            write_feed(&mut tx, feed).await?;
        }
        for group in &library.groups {
            write_group(&mut tx, group).await?;
        }
        for post in &library.posts {
            write_post(&mut tx, post, true).await?;
        }
        for word in &library.blocked_words {
            write_blocked_word(&mut tx, word).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            feeds = library.feeds.len(),
            groups = library.groups.len(),
            posts = library.posts.len(),
            blocked_words = library.blocked_words.len(),
            "Applied library"
        );
        Ok(())
    }

    async fn feeds(&self) -> anyhow::Result<Vec<Feed>> {
        let feeds = sqlx::query("SELECT * FROM feeds WHERE is_deleted = 0 ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(feed_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(feeds)
    }

    async fn feed(&self, id: &str) -> anyhow::Result<Option<Feed>> {
        let row = sqlx::query("SELECT * FROM feeds WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(feed_from_row).transpose()?)
    }

    async fn feed_by_remote_id(&self, remote_id: &str) -> anyhow::Result<Option<Feed>> {
        let row = sqlx::query("SELECT * FROM feeds WHERE remote_id = ? LIMIT 1")
            .bind(remote_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(feed_from_row).transpose()?)
    }

    async fn upsert_feed(&self, feed: &Feed) -> anyhow::Result<()> {
        let mut conn = self.pool.acquire().await?;
        write_feed(&mut conn, feed).await?;
        tracing::trace!(feed_id = %feed.id, "Saved feed");
        Ok(())
    }

    async fn update_feed_last_updated_at(
        &self,
        feed_id: &str,
        last_updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE feeds SET last_updated_at = ? WHERE id = ?")
            .bind(millis(&last_updated_at))
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_feed_refresh_interval(
        &self,
        feed_id: &str,
        refresh_interval: Duration,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE feeds SET refresh_interval_ms = ? WHERE id = ?")
            .bind(refresh_interval.num_milliseconds())
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_feeds_last_clean_up_at(
        &self,
        updates: &[(String, DateTime<Utc>)],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for (feed_id, at) in updates {
            sqlx::query("UPDATE feeds SET last_clean_up_at = ? WHERE id = ?")
                .bind(millis(at))
                .bind(feed_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_read_posts_before(
        &self,
        feed_id: &str,
        before: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "DELETE FROM posts WHERE source_id = ? AND is_read = 1 AND is_bookmarked = 0 \
             AND post_date < ?",
        )
        .bind(feed_id)
        .bind(millis(&before))
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::debug!(feed_id, deleted, "Deleted read posts");
        }
        Ok(deleted)
    }

    async fn add_posts(&self, posts: &[Post]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for post in posts {
            inserted += write_post(&mut tx, post, false).await?;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn posts_count_for_feed(&self, feed_id: &str) -> anyhow::Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE source_id = ? AND is_deleted = 0")
                .bind(feed_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn unread_posts_count_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<u64> {
        let since = optional_millis(&since);
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts WHERE is_read = 0 AND is_deleted = 0 \
             AND (? IS NULL OR created_at > ?)",
        )
        .bind(since)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn remote_posts_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Post>> {
        let since = optional_millis(&since);
        let posts = sqlx::query(
            "SELECT * FROM posts WHERE remote_id IS NOT NULL \
             AND (? IS NULL OR updated_at > ?) ORDER BY updated_at",
        )
        .bind(since)
        .bind(since)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(post_from_row)
        .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn prune_group_feed_ids(&self) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "DELETE FROM group_feeds WHERE feed_id NOT IN \
             (SELECT id FROM feeds WHERE is_deleted = 0)",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// ============================================================================
// IUserRepository
// ============================================================================

#[async_trait::async_trait]
impl IUserRepository for SqliteStore {
    async fn save_user(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO users \
             (service, id, name, profile_id, email, token, refresh_token, server_url) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user.service.as_str())
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.profile_id)
        .bind(&user.email)
        .bind(&user.token)
        .bind(&user.refresh_token)
        .bind(&user.server_url)
        .execute(&self.pool)
        .await?;

        tracing::trace!(service = %user.service, "Saved user");
        self.publish_users().await?;
        Ok(())
    }

    async fn user(&self, service: ServiceType) -> anyhow::Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE service = ?")
            .bind(service.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn users(&self) -> anyhow::Result<Vec<User>> {
        Ok(load_users(&self.pool).await?)
    }

    async fn update_token(&self, service: ServiceType, token: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET token = ? WHERE service = ?")
            .bind(token)
            .bind(service.as_str())
            .execute(&self.pool)
            .await?;
        self.publish_users().await?;
        Ok(())
    }

    async fn update_refresh_token(
        &self,
        service: ServiceType,
        token: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET refresh_token = ? WHERE service = ?")
            .bind(token)
            .bind(service.as_str())
            .execute(&self.pool)
            .await?;
        self.publish_users().await?;
        Ok(())
    }

    async fn delete_user(&self, service: ServiceType) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE service = ?")
            .bind(service.as_str())
            .execute(&self.pool)
            .await?;
        tracing::debug!(service = %service, "Deleted user");
        self.publish_users().await?;
        Ok(())
    }

    fn observe_users(&self) -> BoxStream<'static, Vec<User>> {
        let rx = self.users_tx.subscribe();
        stream::unfold((rx, true), |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let users = rx.borrow_and_update().clone();
            Some((users, (rx, false)))
        })
        .boxed()
    }
}

// ============================================================================
// ISettingsRepository
// ============================================================================

#[async_trait::async_trait]
impl ISettingsRepository for SqliteStore {
    async fn auto_sync_enabled(&self) -> anyhow::Result<bool> {
        Ok(self.bool_setting(SETTING_AUTO_SYNC, true).await?)
    }

    async fn set_auto_sync_enabled(&self, enabled: bool) -> anyhow::Result<()> {
        Ok(self
            .set_setting(SETTING_AUTO_SYNC, &enabled.to_string())
            .await?)
    }

    async fn notifications_enabled(&self) -> anyhow::Result<bool> {
        Ok(self.bool_setting(SETTING_NOTIFICATIONS, true).await?)
    }

    async fn set_notifications_enabled(&self, enabled: bool) -> anyhow::Result<()> {
        Ok(self
            .set_setting(SETTING_NOTIFICATIONS, &enabled.to_string())
            .await?)
    }

    async fn last_synced_at(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        let Some(value) = self.setting(SETTING_LAST_SYNCED_AT).await? else {
            return Ok(None);
        };
        let ms: i64 = value.parse().map_err(|_| {
            StoreError::SerializationError(format!("Invalid last_synced_at value: {}", value))
        })?;
        Ok(Some(datetime_from_millis(ms)?))
    }

    async fn set_last_synced_at(&self, at: DateTime<Utc>) -> anyhow::Result<()> {
        Ok(self
            .set_setting(SETTING_LAST_SYNCED_AT, &millis(&at).to_string())
            .await?)
    }

    async fn last_sync_status(&self) -> anyhow::Result<Option<SyncStatus>> {
        let Some(value) = self.setting(SETTING_LAST_SYNC_STATUS).await? else {
            return Ok(None);
        };
        Ok(Some(value.parse::<SyncStatus>()?))
    }

    async fn set_last_sync_status(&self, status: SyncStatus) -> anyhow::Result<()> {
        Ok(self
            .set_setting(SETTING_LAST_SYNC_STATUS, status.as_str())
            .await?)
    }
}
