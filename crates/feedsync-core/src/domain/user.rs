//! User domain entity
//!
//! A user record exists per signed-in [`ServiceType`]. For file-store
//! services it is a placeholder carrying the OAuth tokens; for aggregator
//! accounts it also carries the server URL.

use super::service::{BackendKind, ServiceType};

/// The signed-in identity for one remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub service: ServiceType,
    pub id: String,
    pub name: String,
    pub profile_id: Option<String>,
    pub email: String,
    /// Access token (file store) or API token (aggregator)
    pub token: String,
    pub refresh_token: Option<String>,
    /// Present only for aggregator accounts
    pub server_url: Option<String>,
}

impl User {
    /// Creates the placeholder record saved after a file-store OAuth login
    pub fn placeholder(service: ServiceType) -> Self {
        let (name, email) = match service {
            ServiceType::Dropbox => ("Dropbox User", "user@dropbox"),
            ServiceType::Miniflux => ("Miniflux User", "user@miniflux"),
        };
        Self {
            service,
            id: "1".to_string(),
            name: name.to_string(),
            profile_id: None,
            email: email.to_string(),
            token: String::new(),
            refresh_token: None,
            server_url: None,
        }
    }

    /// Returns true if the record holds a usable login for its service
    pub fn is_signed_in(&self) -> bool {
        if self.token.trim().is_empty() {
            return false;
        }
        match self.service.kind() {
            BackendKind::FileStore => self.server_url.is_none(),
            BackendKind::Account => self.server_url.is_some(),
        }
    }
}
