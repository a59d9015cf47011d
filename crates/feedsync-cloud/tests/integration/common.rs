//! Shared test helpers for cloud integration tests
//!
//! Each helper starts a fresh mock server and an in-memory store, and
//! returns clients pointed at the mock server.

use std::sync::Arc;

use wiremock::MockServer;

use feedsync_cloud::{DropboxProvider, MinifluxClient, OAuthManager, UserTokenProvider};
use feedsync_core::config::{ConfigBuilder, DropboxConfig, PkceMethod};
use feedsync_core::domain::{ServiceType, User};
use feedsync_core::ports::IUserRepository;
use feedsync_store::{DatabasePool, SqliteStore};

pub const CLIENT_ID: &str = "test-client-id";

pub struct TestEnv {
    pub server: MockServer,
    pub store: Arc<SqliteStore>,
    pub tokens: Arc<UserTokenProvider>,
    pub config: DropboxConfig,
}

impl TestEnv {
    pub fn users(&self) -> Arc<dyn IUserRepository> {
        self.store.clone()
    }

    pub fn dropbox(&self) -> DropboxProvider {
        DropboxProvider::new(self.config.clone(), self.tokens.clone())
    }

    pub fn oauth(&self) -> OAuthManager {
        OAuthManager::new(self.config.clone(), self.users())
    }

    pub fn miniflux(&self) -> MinifluxClient {
        MinifluxClient::new(self.users(), 100)
    }
}

/// Starts a mock server and an empty in-memory store
pub async fn setup() -> TestEnv {
    setup_with_pkce(PkceMethod::Plain).await
}

pub async fn setup_with_pkce(method: PkceMethod) -> TestEnv {
    let server = MockServer::start().await;

    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = Arc::new(
        SqliteStore::new(pool.pool().clone())
            .await
            .expect("Failed to create store"),
    );
    let tokens = Arc::new(UserTokenProvider::new(store.clone()));

    let config = ConfigBuilder::new()
        .dropbox_client_id(CLIENT_ID)
        .dropbox_base_url(server.uri())
        .dropbox_pkce_method(method)
        .build()
        .dropbox;

    TestEnv {
        server,
        store,
        tokens,
        config,
    }
}

/// Stores a signed-in Dropbox user with the given tokens
pub async fn sign_in_dropbox(env: &TestEnv, access: &str, refresh: &str) {
    let mut user = User::placeholder(ServiceType::Dropbox);
    user.token = access.to_string();
    user.refresh_token = Some(refresh.to_string());
    env.store.save_user(&user).await.unwrap();
}

/// Stores a signed-in Miniflux user pointing at the mock server
pub async fn sign_in_miniflux(env: &TestEnv, api_key: &str) {
    let mut user = User::placeholder(ServiceType::Miniflux);
    user.token = api_key.to_string();
    user.server_url = Some(env.server.uri());
    env.store.save_user(&user).await.unwrap();
}
