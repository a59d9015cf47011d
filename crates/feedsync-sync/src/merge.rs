//! Last-write-wins merge of two snapshots
//!
//! Everything here is pure: no I/O, no clock reads. The caller passes the
//! merge instant in [`MergeOptions`].
//!
//! ## Rules
//!
//! - Feeds compare `lastUpdatedAt`, groups, blocked words and posts compare
//!   `updatedAt`. The greater timestamp wins the whole entity; on a tie the
//!   local copy is kept. An entity present on one side only is kept.
//! - A group without `updatedAt` counts as written at merge time.
//! - Timestamps further in the future than the skew tolerance are clamped
//!   to the merge instant before comparing, so a device with a clock set
//!   far ahead cannot win every conflict forever.
//! - `lastCleanUpAt` takes the later value of both sides regardless of
//!   which feed copy won.
//! - Bookmarks are the union of both sides, reconciled with the posts. A
//!   side that lists a post id as bookmarked has that copy flagged
//!   `Bookmarked` before comparing, so the union reaches the stored flags.
//!   Where a merged post exists its winning copy decides, which lets a newer
//!   un-bookmark remove the id. Ids without a post are kept as listed.
//! - Group feed ids that reference no live merged feed are pruned.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use feedsync_core::domain::PostFlag;

use crate::snapshot::{PostSyncEntity, SyncData, CURRENT_VERSION};

/// Inputs to a merge besides the two snapshots
#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    /// The instant the merge happens
    pub now: DateTime<Utc>,
    /// How far in the future a timestamp may be before it is clamped
    pub clock_skew_tolerance: Duration,
}

impl MergeOptions {
    pub fn new(now: DateTime<Utc>, clock_skew_tolerance: Duration) -> Self {
        Self {
            now,
            clock_skew_tolerance,
        }
    }

    fn now_ms(&self) -> i64 {
        self.now.timestamp_millis()
    }

    /// Clamps a timestamp that lies beyond the tolerated skew
    fn effective(&self, ms: i64) -> i64 {
        let limit = (self.now + self.clock_skew_tolerance).timestamp_millis();
        if ms > limit {
            self.now_ms()
        } else {
            ms
        }
    }
}

/// Keeps local order, appends remote-only entities, and replaces a local
/// entity when the remote copy has a strictly greater effective timestamp
fn last_write_wins<T>(
    local: Vec<T>,
    remote: Vec<T>,
    id: impl Fn(&T) -> &str,
    stamp: impl Fn(&T) -> i64,
    options: &MergeOptions,
) -> Vec<T> {
    let mut merged: Vec<T> = Vec::with_capacity(local.len().max(remote.len()));
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in local {
        match index.get(id(&item)).copied() {
            Some(existing) => merged[existing] = item,
            None => {
                index.insert(id(&item).to_string(), merged.len());
                merged.push(item);
            }
        }
    }

    for item in remote {
        match index.get(id(&item)).copied() {
            Some(existing) => {
                if options.effective(stamp(&item)) > options.effective(stamp(&merged[existing])) {
                    merged[existing] = item;
                }
            }
            None => {
                index.insert(id(&item).to_string(), merged.len());
                merged.push(item);
            }
        }
    }

    merged
}

/// Merges `remote` into `local`
pub fn merge(mut local: SyncData, mut remote: SyncData, options: &MergeOptions) -> SyncData {
    flag_listed_bookmarks(&mut local);
    flag_listed_bookmarks(&mut remote);

    let mut clean_ups: HashMap<String, i64> = HashMap::new();
    for feed in local.feeds.iter().chain(remote.feeds.iter()) {
        if let Some(at) = feed.last_clean_up_at {
            let entry = clean_ups.entry(feed.id.clone()).or_insert(at);
            *entry = (*entry).max(at);
        }
    }

    let mut feeds = last_write_wins(
        local.feeds,
        remote.feeds,
        |f| f.id.as_str(),
        |f| f.last_updated_at.unwrap_or(0),
        options,
    );
    for feed in &mut feeds {
        feed.last_clean_up_at = clean_ups.get(&feed.id).copied();
    }

    let now_ms = options.now_ms();
    let mut groups = last_write_wins(
        local.groups,
        remote.groups,
        |g| g.id.as_str(),
        |g| g.updated_at.unwrap_or(now_ms),
        options,
    );
    let live_feeds: HashSet<&str> = feeds
        .iter()
        .filter(|f| !f.is_deleted)
        .map(|f| f.id.as_str())
        .collect();
    for group in &mut groups {
        group.feed_ids.retain(|id| live_feeds.contains(id.as_str()));
    }

    let blocked_words = last_write_wins(
        local.blocked_words,
        remote.blocked_words,
        |w| w.id.as_str(),
        |w| w.updated_at,
        options,
    );

    let posts = last_write_wins(
        local.posts,
        remote.posts,
        |p| p.id.as_str(),
        |p| p.updated_at,
        options,
    );

    let post_ids: HashSet<&str> = posts.iter().map(|p| p.id.as_str()).collect();
    let mut bookmarks: BTreeSet<String> = local
        .bookmarks
        .into_iter()
        .chain(remote.bookmarks)
        .filter(|id| !post_ids.contains(id.as_str()))
        .collect();
    bookmarks.extend(
        posts
            .iter()
            .filter(|p| p.is_bookmarked())
            .map(|p| p.id.clone()),
    );

    SyncData {
        version: CURRENT_VERSION,
        feeds,
        groups,
        bookmarks,
        blocked_words,
        posts,
        user: local.user.or(remote.user),
    }
}

/// Flags every post listed in `data.bookmarks` as bookmarked
fn flag_listed_bookmarks(data: &mut SyncData) {
    for post in &mut data.posts {
        if data.bookmarks.contains(&post.id) {
            post.flags.insert(PostFlag::Bookmarked);
        }
    }
}

/// Drops posts already covered by their feed's read-post cleanup
///
/// A post is dropped iff it is read, not bookmarked, and published before
/// the `lastCleanUpAt` recorded for its feed. Posts of feeds without a
/// cleanup instant are always kept.
pub fn filter_posts(
    posts: Vec<PostSyncEntity>,
    clean_up_at_by_feed: &HashMap<String, i64>,
) -> Vec<PostSyncEntity> {
    posts
        .into_iter()
        .filter(|post| {
            if post.is_bookmarked() || !post.is_read() {
                return true;
            }
            match clean_up_at_by_feed.get(&post.source_id) {
                Some(&clean_up_at) => post.post_date >= clean_up_at,
                None => true,
            }
        })
        .collect()
}

/// Cleanup instants of the snapshot's feeds, keyed by feed id
pub fn clean_up_instants(data: &SyncData) -> HashMap<String, i64> {
    data.feeds
        .iter()
        .filter_map(|f| f.last_clean_up_at.map(|at| (f.id.clone(), at)))
        .collect()
}
