//! Status command - Display sync status
//!
//! Shows the active backend, the outcome and time of the last sync, the
//! feed count and the unread posts waiting locally.

use anyhow::Result;
use clap::Args;

use feedsync_core::domain::BackendKind;
use feedsync_core::ports::{IRssRepository, ISettingsRepository, IUserRepository};

use crate::context::AppContext;
use crate::GlobalOpts;

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, opts: &GlobalOpts) -> Result<()> {
        let fmt = opts.format.formatter();
        let ctx = AppContext::open(&opts.config_path).await?;

        let service = ctx.store.current_user().await?.map(|u| u.service);
        let backend = match service.map(|s| s.kind()) {
            Some(BackendKind::FileStore) => "file store",
            Some(BackendKind::Account) => "account",
            None => "offline",
        };
        let last_synced_at = ctx.store.last_synced_at().await?;
        let last_status = ctx.store.last_sync_status().await?;
        let feeds = ctx
            .store
            .feeds()
            .await?
            .into_iter()
            .filter(|f| !f.is_deleted)
            .count();
        let unread = ctx.store.unread_posts_count_since(None).await?;
        let auto_sync = ctx.store.auto_sync_enabled().await?;
        let notifications = ctx.store.notifications_enabled().await?;

        if opts.format.is_json() {
            fmt.print_json(&serde_json::json!({
                "service": service.map(|s| s.as_str()),
                "backend": backend,
                "last_synced_at": last_synced_at.map(|t| t.to_rfc3339()),
                "last_sync_status": last_status.map(|s| s.as_str()),
                "feeds": feeds,
                "unread_posts": unread,
                "auto_sync": auto_sync,
                "notifications": notifications,
            }));
            return Ok(());
        }

        match service {
            Some(service) => fmt.success(&format!("Syncing with {service} ({backend})")),
            None => fmt.success("Offline; feeds are refreshed locally"),
        }
        fmt.info(&format!(
            "Last sync:     {}",
            match (last_synced_at, last_status) {
                (Some(at), Some(status)) => format!("{} ({})", at.to_rfc3339(), status.as_str()),
                (Some(at), None) => at.to_rfc3339(),
                (None, Some(status)) => status.as_str().to_string(),
                (None, None) => "never".to_string(),
            }
        ));
        fmt.info(&format!("Feeds:         {feeds}"));
        fmt.info(&format!("Unread posts:  {unread}"));
        fmt.info(&format!("Auto-sync:     {}", on_off(auto_sync)));
        fmt.info(&format!("Notifications: {}", on_off(notifications)));
        Ok(())
    }
}

pub(crate) fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
