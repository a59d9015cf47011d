//! FeedSync Cloud - Remote backend clients
//!
//! Provides async clients for:
//! - OAuth2 authorization (Authorization Code with PKCE)
//! - Transparent access-token refresh on expired-token responses
//! - Dropbox file operations backing the snapshot sync
//! - The Miniflux aggregator API backing account sync
//!
//! ## Modules
//!
//! - [`auth`] - PKCE authorization flow and pending-flow bookkeeping
//! - [`callback`] - Loopback HTTP server capturing the OAuth redirect
//! - [`dropbox`] - Dropbox implementation of `IFileCloudServiceProvider`
//! - [`miniflux`] - Miniflux implementation of `IAggregatorApi`
//! - [`refresh`] - Refresh-on-401 request decorator
//! - [`token_provider`] - `IOAuthTokenProvider` over the user repository

pub mod auth;
pub mod callback;
pub mod dropbox;
pub mod miniflux;
pub mod refresh;
pub mod token_provider;

pub use auth::OAuthManager;
pub use dropbox::DropboxProvider;
pub use miniflux::MinifluxClient;
pub use token_provider::UserTokenProvider;

use thiserror::Error;

/// Errors that can occur when talking to a remote backend
#[derive(Debug, Error)]
pub enum CloudError {
    /// No usable credentials are stored for the service
    #[error("Not signed in")]
    NotSignedIn,

    /// A required setting (such as the app key) is missing
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Credentials were rejected and could not be renewed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The refresh grant failed
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// The backend answered with a status the caller does not handle
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Persisting credentials failed
    #[error("Storage error: {0}")]
    Storage(String),
}
