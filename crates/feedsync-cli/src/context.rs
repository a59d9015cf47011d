//! Wiring of configuration, store and remote clients for one command

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use feedsync_cloud::{DropboxProvider, MinifluxClient, UserTokenProvider};
use feedsync_core::config::Config;
use feedsync_store::{DatabasePool, SqliteStore};
use feedsync_sync::{Backend, DefaultSyncCoordinator, SyncDependencies};
use feedsync_telemetry::{FileFailureReporter, LocalReportStore};

use crate::adapters::{JsonFeedFetcher, LogNotificationService};

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
}

impl AppContext {
    /// Loads the configuration at `config_path` and opens the database
    pub async fn open(config_path: &Path) -> Result<Self> {
        let config = Config::load_or_default(config_path);
        info!(config_path = %config_path.display(), "Loaded configuration");

        let pool = DatabasePool::new(&config.store.database)
            .await
            .context("Failed to open database")?;
        let store = Arc::new(SqliteStore::new(pool.pool().clone()).await?);

        Ok(Self { config, store })
    }

    pub fn dropbox(&self) -> Arc<DropboxProvider> {
        let tokens = Arc::new(UserTokenProvider::new(self.store.clone()));
        Arc::new(DropboxProvider::new(self.config.dropbox.clone(), tokens))
    }

    pub fn miniflux(&self) -> Arc<MinifluxClient> {
        Arc::new(MinifluxClient::new(
            self.store.clone(),
            self.config.miniflux.request_limit,
        ))
    }

    pub fn dependencies(&self) -> Result<SyncDependencies> {
        Ok(SyncDependencies {
            rss: self.store.clone(),
            users: self.store.clone(),
            settings: self.store.clone(),
            fetcher: Arc::new(JsonFeedFetcher::new()?),
            file_store: Some(self.dropbox()),
            aggregator: Some(self.miniflux()),
            config: self.config.sync.clone(),
        })
    }

    /// Builds the coordinator of the active user's backend
    pub async fn coordinator(&self) -> Result<DefaultSyncCoordinator> {
        let backend = Backend::for_current_user(&self.dependencies()?).await?;
        Ok(DefaultSyncCoordinator::new(backend).with_notifications(
            self.store.clone(),
            self.store.clone(),
            Arc::new(LogNotificationService),
        ))
    }

    pub fn report_store(&self) -> LocalReportStore {
        LocalReportStore::new(self.config.telemetry.reports_dir.clone())
    }

    pub fn failure_reporter(&self) -> FileFailureReporter {
        FileFailureReporter::new(self.report_store(), self.config.telemetry.enabled)
    }
}
