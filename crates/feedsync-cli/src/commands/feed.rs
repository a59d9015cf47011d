//! Feed command - Manage subscribed feeds
//!
//! Removal marks the feed deleted instead of dropping it, so the deletion
//! reaches other devices through the next snapshot sync. `clean-up` deletes
//! read posts past `sync.read_post_retention_days` the same way: the cutoff
//! is stamped on each feed and travels with the next push.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use tracing::info;
use uuid::Uuid;

use feedsync_core::domain::Feed;
use feedsync_core::ports::IRssRepository;
use feedsync_sync::{ReadPostCleaner, SyncCoordinator};

use crate::context::AppContext;
use crate::output::plural;
use crate::GlobalOpts;

#[derive(Debug, Subcommand)]
pub enum FeedCommand {
    /// Subscribe to a feed
    Add {
        /// URL of the feed document
        url: String,
        /// Display name (defaults to the feed's own title)
        #[arg(long)]
        name: Option<String>,
        /// Skip the initial refresh
        #[arg(long)]
        no_refresh: bool,
    },
    /// List subscribed feeds
    List,
    /// Unsubscribe from a feed
    Remove {
        /// Feed id
        id: String,
    },
    /// Delete read posts older than the retention period
    CleanUp {
        /// Retention in days (defaults to sync.read_post_retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
}

impl FeedCommand {
    pub async fn execute(&self, opts: &GlobalOpts) -> Result<()> {
        let fmt = opts.format.formatter();
        let ctx = AppContext::open(&opts.config_path).await?;

        match self {
            FeedCommand::Add {
                url,
                name,
                no_refresh,
            } => {
                let existing = ctx.store.feeds().await?;
                if existing.iter().any(|f| !f.is_deleted && f.link == *url) {
                    fmt.error(&format!("Already subscribed to {url}"));
                    return Ok(());
                }

                let mut feed = Feed::new(
                    Uuid::new_v4().to_string(),
                    name.clone().unwrap_or_default(),
                    url.clone(),
                );
                feed.pinned_position = existing.len() as f64;
                ctx.store.upsert_feed(&feed).await?;
                info!(feed_id = %feed.id, url = %url, "Feed added");

                if !*no_refresh && !ctx.coordinator().await?.pull_feed(&feed.id).await {
                    fmt.error("Initial refresh failed; the feed will be retried on the next pull");
                }

                if opts.format.is_json() {
                    fmt.print_json(&serde_json::json!({ "id": feed.id, "link": feed.link }));
                } else {
                    fmt.success(&format!("Subscribed to {url}"));
                    fmt.info(&format!("id: {}", feed.id));
                }
            }

            FeedCommand::List => {
                let feeds: Vec<Feed> = ctx
                    .store
                    .feeds()
                    .await?
                    .into_iter()
                    .filter(|f| !f.is_deleted)
                    .collect();

                if opts.format.is_json() {
                    let mut json = Vec::with_capacity(feeds.len());
                    for feed in &feeds {
                        json.push(serde_json::json!({
                            "id": feed.id,
                            "name": feed.name,
                            "link": feed.link,
                            "remote_id": feed.remote_id,
                            "last_updated_at": feed.last_updated_at.map(|t| t.to_rfc3339()),
                            "posts": ctx.store.posts_count_for_feed(&feed.id).await?,
                        }));
                    }
                    fmt.print_json(&serde_json::json!(json));
                    return Ok(());
                }

                if feeds.is_empty() {
                    fmt.info("No feeds. Add one with 'feedsync feed add <url>'.");
                    return Ok(());
                }

                let now = Utc::now();
                println!("{:<36}  {:<30}  {:>6}  {}", "ID", "Name", "Posts", "Updated");
                println!("{}", "-".repeat(90));
                for feed in &feeds {
                    let posts = ctx.store.posts_count_for_feed(&feed.id).await?;
                    let updated = match feed.last_updated_at {
                        Some(at) => format!("{} min ago", (now - at).num_minutes()),
                        None => "never".to_string(),
                    };
                    println!(
                        "{:<36}  {:<30}  {:>6}  {}",
                        feed.id,
                        truncate(display_name(feed), 30),
                        posts,
                        updated
                    );
                }
                println!();
                println!("Total: {}", plural(feeds.len() as u64, "feed"));
            }

            FeedCommand::Remove { id } => {
                let mut feed = ctx
                    .store
                    .feed(id)
                    .await?
                    .filter(|f| !f.is_deleted)
                    .with_context(|| format!("No feed with id '{id}'"))?;

                feed.is_deleted = true;
                feed.last_updated_at = Some(Utc::now());
                ctx.store.upsert_feed(&feed).await?;
                info!(feed_id = %id, "Feed removed");
                fmt.success(&format!("Unsubscribed from {}", display_name(&feed)));
            }

            FeedCommand::CleanUp { days } => {
                let days = days.unwrap_or(ctx.config.sync.read_post_retention_days);
                let summary = ReadPostCleaner::new(ctx.store.clone(), days)
                    .clean_up(Utc::now())
                    .await?;

                if opts.format.is_json() {
                    fmt.print_json(&serde_json::json!({
                        "retention_days": days,
                        "feeds": summary.feeds,
                        "deleted_posts": summary.deleted_posts,
                    }));
                } else if days == 0 {
                    fmt.info("Read-post retention is disabled (0 days)");
                } else {
                    fmt.success(&format!(
                        "Deleted {} from {}",
                        plural(summary.deleted_posts, "read post"),
                        plural(u64::from(summary.feeds), "feed")
                    ));
                }
            }
        }

        Ok(())
    }
}

fn display_name(feed: &Feed) -> &str {
    if feed.name.is_empty() {
        &feed.link
    } else {
        &feed.name
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('\u{2026}');
        out
    }
}
