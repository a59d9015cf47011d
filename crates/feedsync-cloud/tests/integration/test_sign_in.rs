//! Integration tests for provider-scoped sign-in state

use futures_util::StreamExt;

use feedsync_core::domain::ServiceType;
use feedsync_core::ports::{IFileCloudServiceProvider, IOAuthTokenProvider};

use crate::common;

#[tokio::test]
async fn test_sign_in_is_scoped_to_service() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "token", "refresh").await;

    assert!(env.tokens.is_signed_in_immediate(ServiceType::Dropbox).await);
    assert!(!env.tokens.is_signed_in_immediate(ServiceType::Miniflux).await);

    common::sign_in_miniflux(&env, "api-key").await;
    env.tokens.sign_out(ServiceType::Dropbox).await.unwrap();

    assert!(!env.tokens.is_signed_in_immediate(ServiceType::Dropbox).await);
    assert!(env.tokens.is_signed_in_immediate(ServiceType::Miniflux).await);
}

#[tokio::test]
async fn test_blank_token_is_signed_out() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "   ", "refresh").await;

    assert!(!env.tokens.is_signed_in_immediate(ServiceType::Dropbox).await);
    assert!(env.tokens.access_token(ServiceType::Dropbox).await.is_none());
}

#[tokio::test]
async fn test_save_access_token_creates_placeholder_user() {
    let env = common::setup().await;

    env.tokens
        .save_access_token(ServiceType::Dropbox, "fresh")
        .await
        .unwrap();

    assert!(env.tokens.is_signed_in_immediate(ServiceType::Dropbox).await);
    assert_eq!(
        env.tokens.access_token(ServiceType::Dropbox).await.as_deref(),
        Some("fresh")
    );
}

#[tokio::test]
async fn test_provider_observes_sign_in_changes() {
    let env = common::setup().await;
    let provider = env.dropbox();
    let mut signed_in = provider.is_signed_in();

    assert_eq!(signed_in.next().await, Some(false));

    common::sign_in_dropbox(&env, "token", "refresh").await;
    assert_eq!(signed_in.next().await, Some(true));

    provider.sign_out().await;
    assert_eq!(signed_in.next().await, Some(false));
    assert!(!provider.is_signed_in_immediate().await);
}
