//! Miniflux aggregator client
//!
//! Implements [`IAggregatorApi`] over the Miniflux REST API. The server URL
//! and API key are read from the stored Miniflux user on every call, so a
//! re-login takes effect without rebuilding the client.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use feedsync_core::domain::{Feed, ServiceType};
use feedsync_core::ports::{FeedPayload, IAggregatorApi, IUserRepository, PostPayload, Subscription};

use crate::refresh::HttpReply;
use crate::CloudError;

const AUTH_HEADER: &str = "X-Auth-Token";

// ============================================================================
// Miniflux API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MinifluxFeed {
    id: i64,
    title: String,
    feed_url: String,
    #[serde(default)]
    site_url: String,
}

#[derive(Debug, Deserialize)]
struct EntriesResponse {
    #[serde(default)]
    entries: Vec<MinifluxEntry>,
}

#[derive(Debug, Deserialize)]
struct MinifluxEntry {
    id: i64,
    url: String,
    title: String,
    #[serde(default)]
    content: String,
    published_at: DateTime<FixedOffset>,
    status: String,
    #[serde(default)]
    starred: bool,
    #[serde(default)]
    comments_url: Option<String>,
}

impl From<MinifluxEntry> for PostPayload {
    fn from(entry: MinifluxEntry) -> Self {
        let raw_content = (!entry.content.is_empty()).then_some(entry.content);
        PostPayload {
            remote_id: Some(entry.id.to_string()),
            link: entry.url,
            title: entry.title,
            description: String::new(),
            image_url: None,
            comments_link: entry.comments_url.filter(|c| !c.is_empty()),
            date: entry.published_at.with_timezone(&Utc),
            raw_content,
            read: entry.status == "read",
            starred: entry.starred,
        }
    }
}

// ============================================================================
// MinifluxClient
// ============================================================================

/// HTTP client for a Miniflux account
pub struct MinifluxClient {
    http: Client,
    users: Arc<dyn IUserRepository>,
    request_limit: u32,
}

impl MinifluxClient {
    /// Creates a client that fetches at most `request_limit` entries per feed
    pub fn new(users: Arc<dyn IUserRepository>, request_limit: u32) -> Self {
        Self {
            http: Client::new(),
            users,
            request_limit,
        }
    }

    /// Builds an authenticated request for `path` on the user's server
    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, CloudError> {
        let user = self
            .users
            .user(ServiceType::Miniflux)
            .await
            .map_err(|e| CloudError::Storage(e.to_string()))?
            .ok_or(CloudError::NotSignedIn)?;
        let server = user.server_url.ok_or(CloudError::NotSignedIn)?;

        let url = format!("{}{}", server.trim_end_matches('/'), path);
        Ok(self
            .http
            .request(method, url)
            .header(AUTH_HEADER, user.token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<HttpReply, CloudError> {
        let reply = HttpReply::read(request.send().await?).await?;
        let status = reply.status;
        match status {
            _ if status.is_success() => Ok(reply),
            StatusCode::UNAUTHORIZED => Err(CloudError::Unauthorized(reply.text())),
            _ => Err(CloudError::UnexpectedStatus {
                status: status.as_u16(),
                body: reply.text(),
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CloudError> {
        let request = self.request(Method::GET, path).await?;
        let reply = self.send(request).await?;
        serde_json::from_slice(&reply.body)
            .map_err(|e| CloudError::InvalidResponse(format!("GET {}: {}", path, e)))
    }
}

#[async_trait::async_trait]
impl IAggregatorApi for MinifluxClient {
    async fn subscriptions(&self) -> Result<Vec<Subscription>> {
        let feeds: Vec<MinifluxFeed> = self.get_json("/v1/feeds").await?;
        debug!(count = feeds.len(), "Fetched Miniflux subscriptions");

        Ok(feeds
            .into_iter()
            .map(|f| Subscription {
                remote_id: f.id.to_string(),
                title: f.title,
                feed_url: f.feed_url,
                site_url: f.site_url,
            })
            .collect())
    }

    async fn feed_entries(&self, feed: &Feed) -> Result<FeedPayload> {
        let remote_id = feed.remote_id.as_deref().ok_or_else(|| {
            CloudError::InvalidResponse(format!("Feed {} has no Miniflux id", feed.id))
        })?;

        let path = format!(
            "/v1/feeds/{}/entries?order=published_at&direction=desc&limit={}",
            remote_id, self.request_limit
        );
        let response: EntriesResponse = self.get_json(&path).await?;
        debug!(feed_id = %feed.id, entries = response.entries.len(), "Fetched Miniflux entries");

        Ok(FeedPayload {
            name: feed.name.clone(),
            description: feed.description.clone(),
            homepage_link: feed.homepage_link.clone(),
            icon: feed.icon.clone(),
            posts: response.entries.into_iter().map(PostPayload::from).collect(),
        })
    }

    async fn update_entries_status(&self, entry_ids: &[String], read: bool) -> Result<()> {
        let ids: Vec<i64> = entry_ids
            .iter()
            .filter_map(|id| match id.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(entry_id = %id, "Skipping non-numeric Miniflux entry id");
                    None
                }
            })
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        let status = if read { "read" } else { "unread" };
        let request = self
            .request(Method::PUT, "/v1/entries")
            .await?
            .json(&json!({ "entry_ids": ids, "status": status }));
        self.send(request).await?;

        debug!(count = ids.len(), status, "Updated Miniflux entry status");
        Ok(())
    }
}
