//! Refresh-on-401 request decorator
//!
//! Wraps a single authenticated HTTP request so that an expired access
//! token is renewed once and the request replayed with the new token.
//!
//! ## Design Notes
//!
//! - Responses are buffered into an [`HttpReply`] because detecting an
//!   expired token requires reading the body.
//! - [`TokenRefresher`] serializes refresh grants. A caller that waited on
//!   the lock reuses the token another caller already obtained instead of
//!   spending the refresh token a second time.

use std::future::Future;
use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use feedsync_core::domain::ServiceType;
use feedsync_core::ports::IOAuthTokenProvider;

use crate::CloudError;

/// Marker Dropbox places in the body of a 401 caused by token expiry
const EXPIRED_TOKEN_MARKER: &str = "expired_access_token";

// ============================================================================
// HttpReply
// ============================================================================

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl HttpReply {
    /// Reads the status and the whole body of `response`
    pub async fn read(response: Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        Ok(Self { status, body })
    }

    /// Body decoded as UTF-8, lossy
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Returns true if `reply` reports an expired access token
pub fn is_expired_token(reply: &HttpReply) -> bool {
    reply.status == StatusCode::UNAUTHORIZED && reply.text().contains(EXPIRED_TOKEN_MARKER)
}

// ============================================================================
// with_token_refresh
// ============================================================================

/// Executes `send` with `access_token`, refreshing once on expiry
///
/// # Arguments
/// * `access_token` - The stored token, `None` when signed out
/// * `send` - Builds and sends the request for a given token
/// * `is_expired` - Decides whether a reply means the token expired
/// * `refresh` - Obtains a new token given the one that expired
///
/// # Returns
/// The final reply, which may still be an error status. Fails with
/// [`CloudError::NotSignedIn`] before any network call when there is no
/// token.
pub async fn with_token_refresh<Req, ReqFut, Ref, RefFut>(
    access_token: Option<String>,
    send: Req,
    is_expired: impl Fn(&HttpReply) -> bool,
    refresh: Ref,
) -> Result<HttpReply, CloudError>
where
    Req: Fn(String) -> ReqFut,
    ReqFut: Future<Output = Result<Response, reqwest::Error>>,
    Ref: FnOnce(String) -> RefFut,
    RefFut: Future<Output = Result<String, CloudError>>,
{
    let token = access_token.ok_or(CloudError::NotSignedIn)?;

    let reply = HttpReply::read(send(token.clone()).await?).await?;
    if !is_expired(&reply) {
        return Ok(reply);
    }

    debug!("Access token expired, refreshing");
    let fresh = refresh(token).await?;
    let reply = HttpReply::read(send(fresh).await?).await?;
    Ok(reply)
}

// ============================================================================
// TokenRefresher
// ============================================================================

/// Token endpoint response for both the code and refresh grants
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Runs the refresh-token grant and persists the result
pub struct TokenRefresher {
    http: Client,
    service: ServiceType,
    token_url: String,
    client_id: String,
    tokens: Arc<dyn IOAuthTokenProvider>,
    lock: Mutex<()>,
}

impl TokenRefresher {
    pub fn new(
        http: Client,
        service: ServiceType,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        tokens: Arc<dyn IOAuthTokenProvider>,
    ) -> Self {
        Self {
            http,
            service,
            token_url: token_url.into(),
            client_id: client_id.into(),
            tokens,
            lock: Mutex::new(()),
        }
    }

    /// Returns a usable access token to replace `stale`
    ///
    /// If another caller refreshed while this one waited on the lock, the
    /// already stored token is returned without a network call.
    pub async fn refresh(&self, stale: &str) -> Result<String, CloudError> {
        let _guard = self.lock.lock().await;

        if let Some(current) = self.tokens.access_token(self.service).await {
            if current != stale {
                debug!(service = %self.service, "Reusing token refreshed by another request");
                return Ok(current);
            }
        }

        let refresh_token = self
            .tokens
            .refresh_token(self.service)
            .await
            .ok_or_else(|| CloudError::TokenRefreshFailed("No refresh token stored".into()))?;

        info!(service = %self.service, "Refreshing access token");

        let params = [
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
        ];
        let response = self.http.post(&self.token_url).form(&params).send().await?;
        let reply = HttpReply::read(response).await?;

        if !reply.status.is_success() {
            warn!(
                service = %self.service,
                status = reply.status.as_u16(),
                "Token refresh rejected"
            );
            return Err(CloudError::TokenRefreshFailed(format!(
                "{}: {}",
                reply.status,
                reply.text()
            )));
        }

        let parsed: TokenResponse = serde_json::from_slice(&reply.body)
            .map_err(|e| CloudError::InvalidResponse(format!("Token response: {}", e)))?;

        self.tokens
            .save_access_token(self.service, &parsed.access_token)
            .await
            .map_err(|e| CloudError::Storage(e.to_string()))?;
        if let Some(ref new_refresh) = parsed.refresh_token {
            self.tokens
                .save_refresh_token(self.service, new_refresh)
                .await
                .map_err(|e| CloudError::Storage(e.to_string()))?;
        }

        info!(service = %self.service, "Access token refreshed");
        Ok(parsed.access_token)
    }
}
