//! User repository port
//!
//! Stores one [`User`] per [`ServiceType`]. The token provider and the
//! OAuth manager read and write credentials exclusively through this port.

use futures_util::stream::BoxStream;

use crate::domain::{ServiceType, User};

#[async_trait::async_trait]
pub trait IUserRepository: Send + Sync {
    /// Inserts or replaces the user of `user.service`
    async fn save_user(&self, user: &User) -> anyhow::Result<()>;

    /// Returns the user stored for `service`
    async fn user(&self, service: ServiceType) -> anyhow::Result<Option<User>>;

    /// Returns every stored user
    async fn users(&self) -> anyhow::Result<Vec<User>>;

    /// Updates the access token of the user stored for `service`
    async fn update_token(&self, service: ServiceType, token: &str) -> anyhow::Result<()>;

    /// Updates the refresh token of the user stored for `service`
    async fn update_refresh_token(&self, service: ServiceType, token: &str)
        -> anyhow::Result<()>;

    /// Deletes the user stored for `service`
    async fn delete_user(&self, service: ServiceType) -> anyhow::Result<()>;

    /// Observes the stored users
    ///
    /// The stream yields the current list first, then the list after every
    /// write.
    fn observe_users(&self) -> BoxStream<'static, Vec<User>>;

    /// Returns the active user: the signed-in user of the highest
    /// priority service
    async fn current_user(&self) -> anyhow::Result<Option<User>> {
        let users = self.users().await?;
        Ok(users
            .into_iter()
            .filter(|u| u.is_signed_in())
            .max_by_key(|u| u.service.priority()))
    }
}
