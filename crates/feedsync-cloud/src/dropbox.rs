//! DropboxProvider - IFileCloudServiceProvider implementation for Dropbox
//!
//! Talks to the Dropbox v2 HTTP API. Content endpoints (`upload`,
//! `download`) take their arguments in the `Dropbox-API-Arg` header; RPC
//! endpoints (`list_folder`, `delete_v2`) take a JSON body.
//!
//! ## Design Notes
//!
//! - Every request goes through [`with_token_refresh`], so an expired token
//!   is renewed once per request without the caller noticing.
//! - Operations never fail. A missing snapshot (409 `path/not_found`) is
//!   expected on first sync and is not logged as a warning.

use std::sync::Arc;

use futures_util::stream::BoxStream;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use feedsync_core::config::DropboxConfig;
use feedsync_core::domain::ServiceType;
use feedsync_core::ports::{FileDownload, IFileCloudServiceProvider, IOAuthTokenProvider};

use crate::refresh::{is_expired_token, with_token_refresh, HttpReply, TokenRefresher};
use crate::CloudError;

const API_ARG_HEADER: &str = "Dropbox-API-Arg";

// ============================================================================
// Dropbox API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    #[serde(default)]
    entries: Vec<ListFolderEntry>,
}

#[derive(Debug, Deserialize)]
struct ListFolderEntry {
    path_display: Option<String>,
}

// ============================================================================
// DropboxProvider
// ============================================================================

/// File cloud provider for a Dropbox account
pub struct DropboxProvider {
    http: Client,
    config: DropboxConfig,
    tokens: Arc<dyn IOAuthTokenProvider>,
    refresher: TokenRefresher,
}

impl DropboxProvider {
    /// Creates a provider reading credentials from `tokens`
    pub fn new(config: DropboxConfig, tokens: Arc<dyn IOAuthTokenProvider>) -> Self {
        let http = Client::new();
        let refresher = TokenRefresher::new(
            http.clone(),
            ServiceType::Dropbox,
            config.token_url.clone(),
            config.client_id.clone().unwrap_or_default(),
            tokens.clone(),
        );
        Self {
            http,
            config,
            tokens,
            refresher,
        }
    }

    /// Sends a request built by `build` with refresh-on-expiry
    async fn call<F, Fut>(&self, build: F) -> Result<HttpReply, CloudError>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let token = self.tokens.access_token(ServiceType::Dropbox).await;
        with_token_refresh(token, build, is_expired_token, |stale| async move {
            self.refresher.refresh(&stale).await
        })
        .await
    }

    fn content_url(&self, endpoint: &str) -> String {
        format!("{}/2/files/{}", self.config.content_url, endpoint)
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/2/files/{}", self.config.api_url, endpoint)
    }
}

/// Logs a request that failed before producing a reply
fn log_call_error(operation: &str, path: &str, error: &CloudError) {
    match error {
        CloudError::NotSignedIn => debug!(operation, path, "Skipped request, not signed in"),
        other => warn!(operation, path, error = %other, "Dropbox request failed"),
    }
}

fn is_not_found(reply: &HttpReply) -> bool {
    reply.status == StatusCode::NOT_FOUND
        || (reply.status == StatusCode::CONFLICT && reply.text().contains("not_found"))
}

#[async_trait::async_trait]
impl IFileCloudServiceProvider for DropboxProvider {
    fn service_type(&self) -> ServiceType {
        ServiceType::Dropbox
    }

    fn name(&self) -> &str {
        "Dropbox"
    }

    fn is_signed_in(&self) -> BoxStream<'static, bool> {
        self.tokens.is_signed_in(ServiceType::Dropbox)
    }

    async fn is_signed_in_immediate(&self) -> bool {
        self.tokens.is_signed_in_immediate(ServiceType::Dropbox).await
    }

    async fn sign_out(&self) {
        if let Err(e) = self.tokens.sign_out(ServiceType::Dropbox).await {
            warn!(error = %e, "Failed to sign out of Dropbox");
        }
    }

    async fn upload(&self, path: &str, data: Vec<u8>) -> bool {
        let url = self.content_url("upload");
        let arg = json!({ "path": path, "mode": "overwrite", "mute": true }).to_string();
        let size = data.len();

        let result = self
            .call(|token| {
                self.http
                    .post(&url)
                    .bearer_auth(token)
                    .header(API_ARG_HEADER, &arg)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(data.clone())
                    .send()
            })
            .await;

        match result {
            Ok(reply) if reply.status == StatusCode::OK => {
                debug!(path, size, "Uploaded file");
                true
            }
            Ok(reply) => {
                warn!(path, status = reply.status.as_u16(), body = %reply.text(), "Upload failed");
                false
            }
            Err(e) => {
                log_call_error("upload", path, &e);
                false
            }
        }
    }

    async fn fetch_file(&self, path: &str) -> FileDownload {
        let url = self.content_url("download");
        let arg = json!({ "path": path }).to_string();

        let result = self
            .call(|token| {
                self.http
                    .post(&url)
                    .bearer_auth(token)
                    .header(API_ARG_HEADER, &arg)
                    .send()
            })
            .await;

        match result {
            Ok(reply) if reply.status == StatusCode::OK => {
                debug!(path, size = reply.body.len(), "Downloaded file");
                FileDownload::Found(reply.body)
            }
            Ok(reply)
                if reply.status == StatusCode::CONFLICT
                    && reply.text().contains("path/not_found") =>
            {
                debug!(path, "File does not exist");
                FileDownload::NotFound
            }
            Ok(reply) => {
                warn!(path, status = reply.status.as_u16(), body = %reply.text(), "Download failed");
                FileDownload::Failed
            }
            Err(e) => {
                log_call_error("download", path, &e);
                FileDownload::Failed
            }
        }
    }

    async fn list_files(&self, prefix: &str) -> Vec<String> {
        let url = self.api_url("list_folder");
        let body = json!({
            "path": "",
            "recursive": false,
            "include_deleted": false,
            "include_media_info": false,
            "include_has_explicit_shared_members": false,
            "include_mounted_folders": true,
        });

        let result = self
            .call(|token| self.http.post(&url).bearer_auth(token).json(&body).send())
            .await;

        let reply = match result {
            Ok(reply) if reply.status == StatusCode::OK => reply,
            Ok(reply) => {
                warn!(prefix, status = reply.status.as_u16(), body = %reply.text(), "List folder failed");
                return Vec::new();
            }
            Err(e) => {
                log_call_error("list_folder", prefix, &e);
                return Vec::new();
            }
        };

        match serde_json::from_slice::<ListFolderResponse>(&reply.body) {
            Ok(listing) => listing
                .entries
                .into_iter()
                .filter_map(|entry| entry.path_display)
                .filter(|path| path.starts_with(prefix))
                .collect(),
            Err(e) => {
                warn!(prefix, error = %e, "Failed to parse list_folder response");
                Vec::new()
            }
        }
    }

    async fn delete_file(&self, path: &str) -> bool {
        let url = self.api_url("delete_v2");
        let body = json!({ "path": path });

        let result = self
            .call(|token| self.http.post(&url).bearer_auth(token).json(&body).send())
            .await;

        match result {
            Ok(reply) if reply.status == StatusCode::OK => {
                debug!(path, "Deleted file");
                true
            }
            Ok(reply) if is_not_found(&reply) => {
                debug!(path, "File to delete does not exist");
                false
            }
            Ok(reply) => {
                warn!(path, status = reply.status.as_u16(), body = %reply.text(), "Delete failed");
                false
            }
            Err(e) => {
                log_call_error("delete_v2", path, &e);
                false
            }
        }
    }
}
