//! Driven adapters owned by the CLI
//!
//! - [`JsonFeedFetcher`] fetches feeds published as JSON Feed 1.x
//! - [`LogNotificationService`] delivers notifications to the log

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use feedsync_core::domain::Feed;
use feedsync_core::ports::{
    FeedPayload, IFeedFetcher, INotificationService, Notification, PostPayload,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// JSON Feed
// ============================================================================

#[derive(Debug, Deserialize)]
struct JsonFeed {
    #[serde(default)]
    title: String,
    description: Option<String>,
    home_page_url: Option<String>,
    icon: Option<String>,
    favicon: Option<String>,
    #[serde(default)]
    items: Vec<JsonFeedItem>,
}

#[derive(Debug, Deserialize)]
struct JsonFeedItem {
    id: serde_json::Value,
    url: Option<String>,
    external_url: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    content_html: Option<String>,
    content_text: Option<String>,
    image: Option<String>,
    banner_image: Option<String>,
    date_published: Option<DateTime<Utc>>,
    date_modified: Option<DateTime<Utc>>,
}

impl JsonFeedItem {
    /// Converts the item; items without any link are dropped
    fn into_payload(self, now: DateTime<Utc>) -> Option<PostPayload> {
        let id = match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let link = self
            .url
            .or(self.external_url.clone())
            .or_else(|| id.starts_with("http").then(|| id.clone()))?;

        Some(PostPayload {
            remote_id: None,
            link,
            title: self.title.unwrap_or_default(),
            description: self
                .summary
                .or(self.content_text)
                .unwrap_or_default(),
            image_url: self.image.or(self.banner_image),
            comments_link: self.external_url,
            date: self.date_published.or(self.date_modified).unwrap_or(now),
            raw_content: self.content_html,
            read: false,
            starred: false,
        })
    }
}

/// Fetches feeds published in the JSON Feed format
pub struct JsonFeedFetcher {
    http: reqwest::Client,
}

impl JsonFeedFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("feedsync/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl IFeedFetcher for JsonFeedFetcher {
    async fn fetch(&self, feed: &Feed) -> anyhow::Result<FeedPayload> {
        let document: JsonFeed = self
            .http
            .get(&feed.link)
            .header(reqwest::header::ACCEPT, "application/feed+json, application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("{} is not a JSON Feed", feed.link))?;

        let now = Utc::now();
        Ok(FeedPayload {
            name: document.title,
            description: document.description.unwrap_or_default(),
            homepage_link: document.home_page_url.unwrap_or_default(),
            icon: document.icon.or(document.favicon).unwrap_or_default(),
            posts: document
                .items
                .into_iter()
                .filter_map(|item| item.into_payload(now))
                .collect(),
        })
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Writes notifications to the log
pub struct LogNotificationService;

#[async_trait::async_trait]
impl INotificationService for LogNotificationService {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            category = %notification.category,
            priority = %notification.priority,
            "{}: {}",
            notification.title,
            notification.body
        );
        Ok(())
    }
}
