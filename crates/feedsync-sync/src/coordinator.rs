//! Sync coordination per backend
//!
//! A [`SyncCoordinator`] is what the application talks to. Which one runs
//! is decided once, from the service of the active user:
//!
//! | Backend                    | pull                                  | push                  |
//! |----------------------------|---------------------------------------|-----------------------|
//! | none                       | refresh due feeds                     | nothing               |
//! | file store (Dropbox)       | snapshot sync, refresh, prune groups  | snapshot sync         |
//! | account (Miniflux)         | import subscriptions, refresh         | send read states      |
//!
//! Every operation publishes its progress on the backend's [`SyncState`]
//! channel and reports success as a `bool`; failures are logged, never
//! returned.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use feedsync_core::config::SyncConfig;
use feedsync_core::domain::{BackendKind, Feed, ServiceType, SyncStatus};
use feedsync_core::ports::{
    FeedPayload, IAggregatorApi, IFeedFetcher, IFileCloudServiceProvider, INotificationService,
    IRssRepository, ISettingsRepository, IUserRepository,
};

use crate::cloud::CloudSyncService;
use crate::local::LocalSyncCoordinator;
use crate::notifier::NewArticleNotifier;
use crate::state::{SyncState, SyncStateHandle};
use crate::SyncError;

/// Contract shared by all backends
#[async_trait::async_trait]
pub trait SyncCoordinator: Send + Sync {
    /// Observes the state of the current or last operation
    fn sync_state(&self) -> watch::Receiver<SyncState>;

    /// Brings local state up to date with the backend
    async fn pull(&self) -> bool;

    /// Refreshes the given feeds only
    async fn pull_feeds(&self, feed_ids: &[String]) -> bool;

    /// Refreshes a single feed
    async fn pull_feed(&self, feed_id: &str) -> bool;

    /// Sends local changes to the backend
    async fn push(&self) -> bool;
}

// ============================================================================
// File store
// ============================================================================

/// Coordinator for file-store backends
///
/// Full pulls and pushes run a snapshot sync through [`CloudSyncService`];
/// targeted pulls only fetch the feeds themselves.
pub struct FileStoreSyncCoordinator {
    cloud: Arc<CloudSyncService>,
    provider: Arc<dyn IFileCloudServiceProvider>,
    rss: Arc<dyn IRssRepository>,
    local: LocalSyncCoordinator,
    state: SyncStateHandle,
}

impl FileStoreSyncCoordinator {
    pub fn new(
        cloud: Arc<CloudSyncService>,
        provider: Arc<dyn IFileCloudServiceProvider>,
        rss: Arc<dyn IRssRepository>,
        fetcher: Arc<dyn IFeedFetcher>,
        chunk_size: usize,
    ) -> Self {
        let state = SyncStateHandle::new();
        let local = LocalSyncCoordinator::new(rss.clone(), fetcher, chunk_size, state.clone());
        info!(provider = provider.name(), "File-store sync coordinator created");
        Self {
            cloud,
            provider,
            rss,
            local,
            state,
        }
    }

    async fn cloud_sync(&self) -> Result<(), SyncError> {
        if self.cloud.sync(self.provider.as_ref()).await {
            Ok(())
        } else {
            Err(SyncError::CloudSyncFailed(self.provider.name().to_string()))
        }
    }
}

#[async_trait::async_trait]
impl SyncCoordinator for FileStoreSyncCoordinator {
    fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    #[tracing::instrument(skip(self))]
    async fn pull(&self) -> bool {
        self.state
            .track("pull", async {
                self.cloud_sync().await?;
                self.local.refresh_due().await?;
                let pruned = self.rss.prune_group_feed_ids().await?;
                if pruned > 0 {
                    debug!(pruned, "Pruned dangling group members");
                }
                Ok(())
            })
            .await
    }

    async fn pull_feeds(&self, feed_ids: &[String]) -> bool {
        self.local.pull_feeds(feed_ids).await
    }

    async fn pull_feed(&self, feed_id: &str) -> bool {
        self.local.pull_feed(feed_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn push(&self) -> bool {
        self.state.track("push", self.cloud_sync()).await
    }
}

// ============================================================================
// Account
// ============================================================================

/// Adapts an aggregator API into a feed source
struct AggregatorFeeds(Arc<dyn IAggregatorApi>);

#[async_trait::async_trait]
impl IFeedFetcher for AggregatorFeeds {
    async fn fetch(&self, feed: &Feed) -> anyhow::Result<FeedPayload> {
        self.0.feed_entries(feed).await
    }
}

/// Coordinator for aggregator accounts
///
/// The aggregator is the source of truth for subscriptions and entries.
/// Local read-state changes are sent back on push.
pub struct AccountSyncCoordinator {
    rss: Arc<dyn IRssRepository>,
    settings: Arc<dyn ISettingsRepository>,
    api: Arc<dyn IAggregatorApi>,
    local: LocalSyncCoordinator,
    state: SyncStateHandle,
}

impl AccountSyncCoordinator {
    pub fn new(
        rss: Arc<dyn IRssRepository>,
        settings: Arc<dyn ISettingsRepository>,
        api: Arc<dyn IAggregatorApi>,
        chunk_size: usize,
    ) -> Self {
        let state = SyncStateHandle::new();
        let local = LocalSyncCoordinator::new(
            rss.clone(),
            Arc::new(AggregatorFeeds(api.clone())),
            chunk_size,
            state.clone(),
        );
        info!("Account sync coordinator created");
        Self {
            rss,
            settings,
            api,
            local,
            state,
        }
    }

    /// Mirrors the aggregator's subscriptions as local feeds
    ///
    /// Subscriptions are matched by remote id, then by feed URL. Local feeds
    /// whose remote subscription disappeared are marked deleted.
    ///
    /// # Returns
    /// The number of feeds created
    pub async fn import_subscriptions(&self) -> Result<u32, SyncError> {
        let subscriptions = self.api.subscriptions().await?;
        let local = self.rss.feeds().await?;
        let by_link: HashMap<&str, &Feed> = local.iter().map(|f| (f.link.as_str(), f)).collect();

        let mut created = 0;
        for subscription in &subscriptions {
            let existing = match self.rss.feed_by_remote_id(&subscription.remote_id).await? {
                Some(feed) => Some(feed),
                None => by_link.get(subscription.feed_url.as_str()).map(|f| (*f).clone()),
            };

            let feed = match existing {
                Some(mut feed) => {
                    if feed.remote_id.as_deref() == Some(subscription.remote_id.as_str())
                        && !feed.is_deleted
                    {
                        continue;
                    }
                    feed.remote_id = Some(subscription.remote_id.clone());
                    feed.is_deleted = false;
                    if feed.homepage_link.is_empty() {
                        feed.homepage_link = subscription.site_url.clone();
                    }
                    feed
                }
                None => {
                    let mut feed = Feed::new(
                        Uuid::new_v4().to_string(),
                        subscription.title.clone(),
                        subscription.feed_url.clone(),
                    );
                    feed.homepage_link = subscription.site_url.clone();
                    feed.remote_id = Some(subscription.remote_id.clone());
                    created += 1;
                    feed
                }
            };
            self.rss.upsert_feed(&feed).await?;
        }

        let remote_ids: HashSet<&str> = subscriptions.iter().map(|s| s.remote_id.as_str()).collect();
        for mut feed in local {
            let gone = feed
                .remote_id
                .as_deref()
                .is_some_and(|id| !remote_ids.contains(id));
            if gone {
                debug!(feed_id = %feed.id, "Subscription removed remotely");
                feed.is_deleted = true;
                self.rss.upsert_feed(&feed).await?;
            }
        }

        info!(subscriptions = subscriptions.len(), created, "Imported subscriptions");
        Ok(created)
    }

    /// Sends read states changed since the last push
    ///
    /// # Returns
    /// The number of entries sent
    pub async fn push_read_states(&self) -> Result<usize, SyncError> {
        let started = Utc::now();
        let since = self.settings.last_synced_at().await?;
        let posts = self.rss.remote_posts_updated_since(since).await?;

        let (read, unread): (Vec<_>, Vec<_>) = posts.iter().partition(|p| p.is_read());
        let read: Vec<String> = read.into_iter().filter_map(|p| p.remote_id.clone()).collect();
        let unread: Vec<String> = unread.into_iter().filter_map(|p| p.remote_id.clone()).collect();

        if !read.is_empty() {
            self.api.update_entries_status(&read, true).await?;
        }
        if !unread.is_empty() {
            self.api.update_entries_status(&unread, false).await?;
        }

        self.settings.set_last_synced_at(started).await?;
        debug!(read = read.len(), unread = unread.len(), "Sent read states");
        Ok(read.len() + unread.len())
    }

    async fn record_status(&self, ok: bool) {
        let status = if ok {
            SyncStatus::Success
        } else {
            SyncStatus::Failure
        };
        if let Err(e) = self.settings.set_last_sync_status(status).await {
            warn!(error = %e, "Failed to record sync status");
        }
    }
}

#[async_trait::async_trait]
impl SyncCoordinator for AccountSyncCoordinator {
    fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    #[tracing::instrument(skip(self))]
    async fn pull(&self) -> bool {
        let ok = self
            .state
            .track("pull", async {
                // Unsent read states would otherwise look stale next to the remote ones
                if let Err(e) = self.push_read_states().await {
                    warn!(error = %e, "Failed to send read states before pull");
                }
                self.import_subscriptions().await?;
                self.local.refresh_due().await?;
                Ok(())
            })
            .await;
        self.record_status(ok).await;
        ok
    }

    async fn pull_feeds(&self, feed_ids: &[String]) -> bool {
        self.local.pull_feeds(feed_ids).await
    }

    async fn pull_feed(&self, feed_id: &str) -> bool {
        self.local.pull_feed(feed_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn push(&self) -> bool {
        let ok = self
            .state
            .track("push", async { self.push_read_states().await.map(|_| ()) })
            .await;
        self.record_status(ok).await;
        ok
    }
}

// ============================================================================
// Backend selection
// ============================================================================

/// Everything a backend may need
///
/// `file_store` and `aggregator` are only required for their backend.
#[derive(Clone)]
pub struct SyncDependencies {
    pub rss: Arc<dyn IRssRepository>,
    pub users: Arc<dyn IUserRepository>,
    pub settings: Arc<dyn ISettingsRepository>,
    pub fetcher: Arc<dyn IFeedFetcher>,
    pub file_store: Option<Arc<dyn IFileCloudServiceProvider>>,
    pub aggregator: Option<Arc<dyn IAggregatorApi>>,
    pub config: SyncConfig,
}

/// The coordinator of the active backend
pub enum Backend {
    /// No signed-in service: feeds are refreshed directly
    Offline(LocalSyncCoordinator),
    FileStore(FileStoreSyncCoordinator),
    Account(AccountSyncCoordinator),
}

impl Backend {
    /// Builds the coordinator for `service`
    ///
    /// Falls back to [`Backend::Offline`] when the backend's provider is
    /// missing from `deps`.
    pub fn select(service: Option<ServiceType>, deps: &SyncDependencies) -> Self {
        let chunk_size = deps.config.refresh_chunk_size;
        let offline = || {
            Backend::Offline(LocalSyncCoordinator::new(
                deps.rss.clone(),
                deps.fetcher.clone(),
                chunk_size,
                SyncStateHandle::new(),
            ))
        };

        let Some(service) = service else {
            info!("No signed-in service, syncing offline");
            return offline();
        };

        match (service.kind(), &deps.file_store, &deps.aggregator) {
            (BackendKind::FileStore, Some(provider), _) => {
                let cloud = Arc::new(CloudSyncService::new(
                    deps.rss.clone(),
                    deps.users.clone(),
                    deps.settings.clone(),
                    &deps.config,
                ));
                Backend::FileStore(FileStoreSyncCoordinator::new(
                    cloud,
                    provider.clone(),
                    deps.rss.clone(),
                    deps.fetcher.clone(),
                    chunk_size,
                ))
            }
            (BackendKind::Account, _, Some(api)) => Backend::Account(AccountSyncCoordinator::new(
                deps.rss.clone(),
                deps.settings.clone(),
                api.clone(),
                chunk_size,
            )),
            _ => {
                warn!(service = %service, "No provider configured for service, syncing offline");
                offline()
            }
        }
    }

    /// Selects the backend of the active user
    pub async fn for_current_user(deps: &SyncDependencies) -> Result<Self, SyncError> {
        let user = deps.users.current_user().await?;
        Ok(Self::select(user.map(|u| u.service), deps))
    }

    fn coordinator(&self) -> &dyn SyncCoordinator {
        match self {
            Backend::Offline(c) => c,
            Backend::FileStore(c) => c,
            Backend::Account(c) => c,
        }
    }

    /// Returns the backend's state handle
    pub fn state(&self) -> &SyncStateHandle {
        match self {
            Backend::Offline(c) => c.state(),
            Backend::FileStore(c) => &c.state,
            Backend::Account(c) => &c.state,
        }
    }

    pub fn kind(&self) -> Option<BackendKind> {
        match self {
            Backend::Offline(_) => None,
            Backend::FileStore(_) => Some(BackendKind::FileStore),
            Backend::Account(_) => Some(BackendKind::Account),
        }
    }
}

#[async_trait::async_trait]
impl SyncCoordinator for Backend {
    fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.coordinator().sync_state()
    }

    async fn pull(&self) -> bool {
        self.coordinator().pull().await
    }

    async fn pull_feeds(&self, feed_ids: &[String]) -> bool {
        self.coordinator().pull_feeds(feed_ids).await
    }

    async fn pull_feed(&self, feed_id: &str) -> bool {
        self.coordinator().pull_feed(feed_id).await
    }

    async fn push(&self) -> bool {
        self.coordinator().push().await
    }
}

// ============================================================================
// Default coordinator
// ============================================================================

/// The application-wide coordinator: the selected backend plus new-article
/// notifications after full pulls
pub struct DefaultSyncCoordinator {
    backend: Backend,
    notifier: Option<NewArticleNotifier>,
}

impl DefaultSyncCoordinator {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            notifier: None,
        }
    }

    /// Sends a notification through `notifications` when a pull brings
    /// new unread posts
    pub fn with_notifications(
        mut self,
        rss: Arc<dyn IRssRepository>,
        settings: Arc<dyn ISettingsRepository>,
        notifications: Arc<dyn INotificationService>,
    ) -> Self {
        self.notifier = Some(NewArticleNotifier::new(
            rss,
            settings,
            notifications,
            self.backend.state().clone(),
        ));
        self
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}

#[async_trait::async_trait]
impl SyncCoordinator for DefaultSyncCoordinator {
    fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.backend.sync_state()
    }

    async fn pull(&self) -> bool {
        // Stored instants have millisecond precision
        let started = Utc::now() - Duration::milliseconds(1);
        let ok = self.backend.pull().await;

        if ok {
            if let Some(notifier) = &self.notifier {
                if let Err(e) = notifier.notify_if_new_articles(started).await {
                    warn!(error = %e, "New-article notification failed");
                }
            }
        }
        ok
    }

    async fn pull_feeds(&self, feed_ids: &[String]) -> bool {
        self.backend.pull_feeds(feed_ids).await
    }

    async fn pull_feed(&self, feed_id: &str) -> bool {
        self.backend.pull_feed(feed_id).await
    }

    async fn push(&self) -> bool {
        self.backend.push().await
    }
}
