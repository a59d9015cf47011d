//! OAuth token provider port
//!
//! Persists access and refresh tokens per [`ServiceType`] so several
//! backends can be signed in at the same time without affecting each other.

use futures_util::stream::BoxStream;

use crate::domain::ServiceType;

#[async_trait::async_trait]
pub trait IOAuthTokenProvider: Send + Sync {
    /// Observes the sign-in state of `service`
    fn is_signed_in(&self, service: ServiceType) -> BoxStream<'static, bool>;

    async fn is_signed_in_immediate(&self, service: ServiceType) -> bool;

    /// Returns the stored access token, treating blank values as absent
    async fn access_token(&self, service: ServiceType) -> Option<String>;

    async fn save_access_token(&self, service: ServiceType, token: &str) -> anyhow::Result<()>;

    /// Returns the stored refresh token, treating blank values as absent
    async fn refresh_token(&self, service: ServiceType) -> Option<String>;

    async fn save_refresh_token(&self, service: ServiceType, token: &str) -> anyhow::Result<()>;

    /// Removes every credential stored for `service`
    async fn sign_out(&self, service: ServiceType) -> anyhow::Result<()>;
}
