//! Settings command - View and change the stored sync preferences

use anyhow::Result;
use clap::{ArgAction, Subcommand};
use tracing::info;

use feedsync_core::ports::ISettingsRepository;

use super::status::on_off;
use crate::context::AppContext;
use crate::GlobalOpts;

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show the current settings
    Show,
    /// Turn periodic sync on or off
    AutoSync {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    /// Turn new-article notifications on or off
    Notifications {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

impl SettingsCommand {
    pub async fn execute(&self, opts: &GlobalOpts) -> Result<()> {
        let fmt = opts.format.formatter();
        let ctx = AppContext::open(&opts.config_path).await?;

        match self {
            SettingsCommand::Show => {
                let auto_sync = ctx.store.auto_sync_enabled().await?;
                let notifications = ctx.store.notifications_enabled().await?;
                if opts.format.is_json() {
                    fmt.print_json(&serde_json::json!({
                        "auto_sync": auto_sync,
                        "notifications": notifications,
                    }));
                } else {
                    fmt.info(&format!("auto-sync      {}", on_off(auto_sync)));
                    fmt.info(&format!("notifications  {}", on_off(notifications)));
                }
            }
            SettingsCommand::AutoSync { enabled } => {
                ctx.store.set_auto_sync_enabled(*enabled).await?;
                info!(enabled, "Auto-sync setting changed");
                fmt.success(&format!("Auto-sync {}", on_off(*enabled)));
            }
            SettingsCommand::Notifications { enabled } => {
                ctx.store.set_notifications_enabled(*enabled).await?;
                info!(enabled, "Notification setting changed");
                fmt.success(&format!("Notifications {}", on_off(*enabled)));
            }
        }
        Ok(())
    }
}
