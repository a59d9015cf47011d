//! Token provider backed by the user repository
//!
//! Tokens live on the per-service [`User`] record, so signing in to one
//! backend never touches another backend's credentials.
//!
//! ## Design Notes
//!
//! - File-store services count as signed in when their user has a
//!   non-blank token and no `server_url`.
//! - Account services count as signed in when their user has a
//!   `server_url`; the token is an API key validated by the server.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::stream::{BoxStream, StreamExt};
use tracing::debug;

use feedsync_core::domain::{BackendKind, ServiceType, User};
use feedsync_core::ports::{IOAuthTokenProvider, IUserRepository};

/// [`IOAuthTokenProvider`] storing tokens on user records
pub struct UserTokenProvider {
    users: Arc<dyn IUserRepository>,
}

impl UserTokenProvider {
    pub fn new(users: Arc<dyn IUserRepository>) -> Self {
        Self { users }
    }

    async fn user(&self, service: ServiceType) -> Option<User> {
        match self.users.user(service).await {
            Ok(user) => user,
            Err(e) => {
                debug!(service = %service, error = %e, "Failed to read user");
                None
            }
        }
    }
}

/// Applies the per-kind sign-in rule to an optional user record
fn signed_in(user: Option<&User>, service: ServiceType) -> bool {
    let Some(user) = user else {
        return false;
    };
    match service.kind() {
        BackendKind::FileStore => !user.token.trim().is_empty() && user.server_url.is_none(),
        BackendKind::Account => user.server_url.is_some(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait::async_trait]
impl IOAuthTokenProvider for UserTokenProvider {
    fn is_signed_in(&self, service: ServiceType) -> BoxStream<'static, bool> {
        self.users
            .observe_users()
            .map(move |users| {
                let user = users.iter().find(|u| u.service == service);
                signed_in(user, service)
            })
            .boxed()
    }

    async fn is_signed_in_immediate(&self, service: ServiceType) -> bool {
        signed_in(self.user(service).await.as_ref(), service)
    }

    async fn access_token(&self, service: ServiceType) -> Option<String> {
        non_blank(self.user(service).await.map(|u| u.token))
    }

    async fn save_access_token(&self, service: ServiceType, token: &str) -> Result<()> {
        if self.user(service).await.is_some() {
            self.users
                .update_token(service, token)
                .await
                .context("Failed to update access token")?;
        } else {
            let mut user = User::placeholder(service);
            user.token = token.to_string();
            self.users
                .save_user(&user)
                .await
                .context("Failed to save user with access token")?;
        }
        debug!(service = %service, "Saved access token");
        Ok(())
    }

    async fn refresh_token(&self, service: ServiceType) -> Option<String> {
        non_blank(self.user(service).await.and_then(|u| u.refresh_token))
    }

    async fn save_refresh_token(&self, service: ServiceType, token: &str) -> Result<()> {
        if self.user(service).await.is_some() {
            self.users
                .update_refresh_token(service, token)
                .await
                .context("Failed to update refresh token")?;
        } else {
            let mut user = User::placeholder(service);
            user.refresh_token = Some(token.to_string());
            self.users
                .save_user(&user)
                .await
                .context("Failed to save user with refresh token")?;
        }
        debug!(service = %service, "Saved refresh token");
        Ok(())
    }

    async fn sign_out(&self, service: ServiceType) -> Result<()> {
        self.users
            .delete_user(service)
            .await
            .with_context(|| format!("Failed to sign out of {}", service))
    }
}
