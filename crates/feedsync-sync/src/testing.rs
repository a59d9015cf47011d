//! In-memory fakes shared by the unit tests of this crate

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};

use feedsync_core::domain::{Feed, Post, PostFlag, ServiceType};
use feedsync_core::ports::{
    FeedPayload, FileDownload, IAggregatorApi, IFeedFetcher, IFileCloudServiceProvider, INotificationService,
    Notification, PostPayload, Subscription,
};
use feedsync_store::{DatabasePool, SqliteStore};

use crate::snapshot::SyncData;

pub async fn memory_store() -> Arc<SqliteStore> {
    let pool = DatabasePool::in_memory().await.unwrap();
    Arc::new(SqliteStore::new(pool.pool().clone()).await.unwrap())
}

pub fn ts(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap()
}

pub fn feed(id: &str) -> Feed {
    Feed::new(id, format!("Feed {id}"), format!("https://{id}.example.com/rss"))
}

pub fn post(feed_id: &str, link: &str, post_date: DateTime<Utc>, flags: &[PostFlag]) -> Post {
    Post {
        id: Post::derive_id(feed_id, link),
        source_id: feed_id.to_string(),
        title: link.to_string(),
        description: String::new(),
        image_url: None,
        post_date,
        created_at: post_date,
        updated_at: post_date,
        synced_at: post_date,
        link: link.to_string(),
        comments_link: None,
        flags: flags.iter().copied().collect(),
        raw_content: None,
        html_content: None,
        remote_id: None,
        is_deleted: false,
    }
}

pub fn payload(link: &str, date: DateTime<Utc>) -> PostPayload {
    PostPayload {
        remote_id: None,
        link: link.to_string(),
        title: link.to_string(),
        description: String::new(),
        image_url: None,
        comments_link: None,
        date,
        raw_content: None,
        read: false,
        starred: false,
    }
}

// ============================================================================
// File store
// ============================================================================

/// In-memory file store
#[derive(Default)]
pub struct MemoryProvider {
    pub files: StdMutex<HashMap<String, Vec<u8>>>,
    pub signed_in: bool,
    pub fail_upload: bool,
    pub fail_download: bool,
    pub fail_list: bool,
    pub uploads: AtomicUsize,
}

impl MemoryProvider {
    pub fn signed_in() -> Self {
        Self {
            signed_in: true,
            ..Default::default()
        }
    }

    pub fn put(&self, path: &str, data: &SyncData) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.encode().unwrap());
    }

    pub fn get(&self, path: &str) -> Option<SyncData> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|bytes| SyncData::decode(bytes).unwrap())
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IFileCloudServiceProvider for MemoryProvider {
    fn service_type(&self) -> ServiceType {
        ServiceType::Dropbox
    }

    fn name(&self) -> &str {
        "Memory"
    }

    fn is_signed_in(&self) -> BoxStream<'static, bool> {
        stream::iter(vec![self.signed_in]).boxed()
    }

    async fn is_signed_in_immediate(&self) -> bool {
        self.signed_in
    }

    async fn sign_out(&self) {}

    async fn upload(&self, path: &str, data: Vec<u8>) -> bool {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_upload {
            return false;
        }
        self.files.lock().unwrap().insert(path.to_string(), data);
        true
    }

    async fn fetch_file(&self, path: &str) -> FileDownload {
        if self.fail_download {
            return FileDownload::Failed;
        }
        match self.files.lock().unwrap().get(path) {
            Some(bytes) => FileDownload::Found(bytes.clone()),
            None => FileDownload::NotFound,
        }
    }

    async fn list_files(&self, prefix: &str) -> Vec<String> {
        if self.fail_list {
            return Vec::new();
        }
        self.files
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    async fn delete_file(&self, path: &str) -> bool {
        self.files.lock().unwrap().remove(path).is_some()
    }
}

// ============================================================================
// Feed sources
// ============================================================================

/// Serves canned payloads keyed by feed link
#[derive(Default)]
pub struct StubFetcher {
    pub payloads: HashMap<String, Vec<PostPayload>>,
    pub calls: AtomicUsize,
}

impl StubFetcher {
    pub fn with(mut self, link: &str, posts: Vec<PostPayload>) -> Self {
        self.payloads.insert(link.to_string(), posts);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IFeedFetcher for StubFetcher {
    async fn fetch(&self, feed: &Feed) -> anyhow::Result<FeedPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let posts = self
            .payloads
            .get(&feed.link)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 for {}", feed.link))?;
        Ok(FeedPayload {
            name: feed.name.clone(),
            posts,
            ..Default::default()
        })
    }
}

/// Aggregator with fixed subscriptions that records status updates
#[derive(Default)]
pub struct StubAggregator {
    pub subscriptions: Vec<Subscription>,
    /// Entries keyed by the feed's remote id
    pub entries: HashMap<String, Vec<PostPayload>>,
    pub status_updates: StdMutex<Vec<(Vec<String>, bool)>>,
    pub fail_status_updates: bool,
}

impl StubAggregator {
    pub fn subscription(mut self, remote_id: &str, feed_url: &str) -> Self {
        self.subscriptions.push(Subscription {
            remote_id: remote_id.to_string(),
            title: format!("Remote {remote_id}"),
            feed_url: feed_url.to_string(),
            site_url: format!("https://site-{remote_id}.example.com"),
        });
        self.entries.entry(remote_id.to_string()).or_default();
        self
    }

    pub fn entries(mut self, remote_id: &str, posts: Vec<PostPayload>) -> Self {
        self.entries.insert(remote_id.to_string(), posts);
        self
    }

    pub fn updates(&self) -> Vec<(Vec<String>, bool)> {
        self.status_updates.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IAggregatorApi for StubAggregator {
    async fn subscriptions(&self) -> anyhow::Result<Vec<Subscription>> {
        Ok(self.subscriptions.clone())
    }

    async fn feed_entries(&self, feed: &Feed) -> anyhow::Result<FeedPayload> {
        let remote_id = feed
            .remote_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("feed {} has no remote id", feed.id))?;
        let posts = self
            .entries
            .get(remote_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown feed {remote_id}"))?;
        Ok(FeedPayload {
            name: feed.name.clone(),
            posts,
            ..Default::default()
        })
    }

    async fn update_entries_status(&self, entry_ids: &[String], read: bool) -> anyhow::Result<()> {
        if self.fail_status_updates {
            anyhow::bail!("500 Internal Server Error");
        }
        self.status_updates
            .lock()
            .unwrap()
            .push((entry_ids.to_vec(), read));
        Ok(())
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifications {
    pub sent: StdMutex<Vec<Notification>>,
}

impl RecordingNotifications {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl INotificationService for RecordingNotifications {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
