//! OAuth2 PKCE authorization flow
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) for a native
//! application talking to Dropbox.
//!
//! ## Components
//!
//! - [`OAuthManager`] - Builds authorization URLs and completes redirects
//! - [`PendingFlow`] - Verifier and metadata of an authorization in progress
//!
//! ## Design Notes
//!
//! - Pending flows are keyed by the `state` parameter, so several
//!   authorizations can be in flight without clobbering each other.
//! - A flow is removed only after its tokens have been stored; a failed
//!   redirect leaves every pending flow in place for a retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, CsrfToken, PkceCodeChallenge, RedirectUrl, Scope};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use feedsync_core::config::{DropboxConfig, PkceMethod};
use feedsync_core::domain::{ServiceType, User};
use feedsync_core::ports::IUserRepository;

use crate::refresh::{HttpReply, TokenResponse};
use crate::CloudError;

/// Scopes needed to read and write the snapshot file
const SCOPES: &[&str] = &["files.content.read", "files.content.write"];

/// Pending flows older than this are dropped
pub const PENDING_FLOW_TTL: Duration = Duration::from_secs(10 * 60);

// ============================================================================
// PendingFlow
// ============================================================================

/// An authorization started by [`OAuthManager::auth_url`]
#[derive(Debug, Clone)]
pub struct PendingFlow {
    pub service: ServiceType,
    /// PKCE code verifier, sent with the code exchange
    pub verifier: String,
    pub created_at: Instant,
}

// ============================================================================
// OAuthManager
// ============================================================================

/// Drives the PKCE authorization-code exchange
pub struct OAuthManager {
    http: Client,
    config: DropboxConfig,
    users: Arc<dyn IUserRepository>,
    pending: DashMap<String, PendingFlow>,
}

impl OAuthManager {
    pub fn new(config: DropboxConfig, users: Arc<dyn IUserRepository>) -> Self {
        Self {
            http: Client::new(),
            config,
            users,
            pending: DashMap::new(),
        }
    }

    fn client_id(&self) -> Result<&str, CloudError> {
        self.config
            .client_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| CloudError::NotConfigured("dropbox.client_id is not set".into()))
    }

    /// Number of authorizations waiting for a redirect
    pub fn pending_flows(&self) -> usize {
        self.pending.len()
    }

    /// Builds the authorization URL for `service` and registers a pending flow
    ///
    /// # Returns
    /// The URL the user must open to grant access
    pub fn auth_url(&self, service: ServiceType) -> Result<String, CloudError> {
        self.pending
            .retain(|_, flow| flow.created_at.elapsed() < PENDING_FLOW_TTL);

        let client = BasicClient::new(ClientId::new(self.client_id()?.to_string()))
            .set_auth_uri(
                AuthUrl::new(self.config.auth_url.clone())
                    .map_err(|e| CloudError::NotConfigured(format!("auth_url: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(self.config.redirect_uri.clone())
                    .map_err(|e| CloudError::NotConfigured(format!("redirect_uri: {}", e)))?,
            );

        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        request = request.add_extra_param("token_access_type", "offline");

        let (url, state) = match self.config.pkce_method {
            PkceMethod::S256 => request.set_pkce_challenge(challenge).url(),
            PkceMethod::Plain => {
                let (mut url, state) = request.url();
                url.query_pairs_mut()
                    .append_pair("code_challenge", verifier.secret())
                    .append_pair("code_challenge_method", "plain");
                (url, state)
            }
        };

        self.pending.insert(
            state.secret().clone(),
            PendingFlow {
                service,
                verifier: verifier.secret().clone(),
                created_at: Instant::now(),
            },
        );

        debug!(service = %service, pending = self.pending.len(), "Generated authorization URL");
        Ok(url.to_string())
    }

    /// Completes an authorization from the redirect the browser landed on
    ///
    /// # Arguments
    /// * `uri` - The redirect URL, absolute or as a path with query
    ///
    /// # Returns
    /// `true` if tokens were obtained and stored
    pub async fn handle_redirect(&self, uri: &str) -> bool {
        match self.complete(uri).await {
            Ok(service) => {
                info!(service = %service, "Authorization completed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Authorization redirect failed");
                false
            }
        }
    }

    async fn complete(&self, uri: &str) -> Result<ServiceType, CloudError> {
        let params = RedirectParams::parse(uri)?;

        if let Some(error) = params.error {
            return Err(CloudError::Unauthorized(error));
        }
        let code = params
            .code
            .ok_or_else(|| CloudError::InvalidResponse("Redirect has no code".into()))?;
        let state = params
            .state
            .ok_or_else(|| CloudError::InvalidResponse("Redirect has no state".into()))?;

        let flow = self
            .pending
            .get(&state)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CloudError::InvalidResponse("Unknown authorization state".into()))?;

        let tokens = self.exchange_code(&code, &flow.verifier).await?;

        let mut user = User::placeholder(flow.service);
        user.token = tokens.access_token;
        user.refresh_token = tokens.refresh_token;
        self.users
            .save_user(&user)
            .await
            .map_err(|e| CloudError::Storage(e.to_string()))?;

        self.pending.remove(&state);
        Ok(flow.service)
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse, CloudError> {
        let client_id = self.client_id()?;
        let params = [
            ("code", code),
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;
        let reply = HttpReply::read(response).await?;

        if !reply.status.is_success() {
            return Err(CloudError::UnexpectedStatus {
                status: reply.status.as_u16(),
                body: reply.text(),
            });
        }

        serde_json::from_slice(&reply.body)
            .map_err(|e| CloudError::InvalidResponse(format!("Token response: {}", e)))
    }
}

// ============================================================================
// Redirect parsing
// ============================================================================

/// Query parameters of an OAuth redirect
#[derive(Debug, Default, PartialEq)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl RedirectParams {
    /// Parses a redirect URL whose parameters may sit in the fragment
    fn parse(uri: &str) -> Result<Self, CloudError> {
        let normalized = if uri.contains('?') {
            uri.replacen('#', "&", 1)
        } else {
            uri.replacen('#', "?", 1)
        };

        let url = Url::parse(&normalized)
            .or_else(|_| Url::parse(&format!("http://localhost{}", normalized)))
            .map_err(|e| CloudError::InvalidResponse(format!("Malformed redirect: {}", e)))?;

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(params)
    }
}
