//! Integration tests for refresh-on-401
//!
//! Verifies that an expired access token is renewed once, persisted, and
//! the original request replayed with the new token.

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use feedsync_core::domain::ServiceType;
use feedsync_core::ports::{IFileCloudServiceProvider, IOAuthTokenProvider};

use crate::common;

const SNAPSHOT: &str = "/feedsync_sync_data.json";

fn expired_body() -> serde_json::Value {
    serde_json::json!({
        "error_summary": "expired_access_token/...",
        "error": { ".tag": "expired_access_token" }
    })
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_retried() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "old-token", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .and(header("Authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(expired_body()))
        .expect(1)
        .mount(&env.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .and(body_string_contains(format!("client_id={}", common::CLIENT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-token",
            "refresh_token": "refresh-2",
            "token_type": "bearer",
            "expires_in": 14400
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .and(header("Authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{}".to_vec()))
        .expect(1)
        .mount(&env.server)
        .await;

    let provider = env.dropbox();
    let data = provider.download(SNAPSHOT).await;
    assert_eq!(data, Some(b"{}".to_vec()));

    let requests = env.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    assert_eq!(
        env.tokens.access_token(ServiceType::Dropbox).await.as_deref(),
        Some("new-token")
    );
    assert_eq!(
        env.tokens.refresh_token(ServiceType::Dropbox).await.as_deref(),
        Some("refresh-2")
    );
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token_when_not_rotated() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "old-token", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path("/2/files/upload"))
        .and(header("Authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(expired_body()))
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-token",
            "token_type": "bearer"
        })))
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/upload"))
        .and(header("Authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&env.server)
        .await;

    assert!(env.dropbox().upload(SNAPSHOT, b"{}".to_vec()).await);
    assert_eq!(
        env.tokens.refresh_token(ServiceType::Dropbox).await.as_deref(),
        Some("refresh-1")
    );
}

#[tokio::test]
async fn test_unauthorized_without_expiry_is_not_refreshed() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "bad-token", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error_summary": "invalid_access_token/...",
            "error": { ".tag": "invalid_access_token" }
        })))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&env.server)
        .await;

    assert!(env.dropbox().download(SNAPSHOT).await.is_none());
}

#[tokio::test]
async fn test_failed_refresh_leaves_tokens_untouched() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "old-token", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .respond_with(ResponseTemplate::new(401).set_body_json(expired_body()))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    assert!(env.dropbox().download(SNAPSHOT).await.is_none());
    assert_eq!(
        env.tokens.access_token(ServiceType::Dropbox).await.as_deref(),
        Some("old-token")
    );
}

#[tokio::test]
async fn test_concurrent_requests_share_one_refresh() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "old-token", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .and(header("Authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(expired_body()))
        .expect(1..=2)
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-token",
            "refresh_token": "refresh-2"
        })))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .and(header("Authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .expect(2)
        .mount(&env.server)
        .await;

    let provider = env.dropbox();
    let (a, b) = tokio::join!(provider.download(SNAPSHOT), provider.download(SNAPSHOT));
    assert_eq!(a, Some(b"data".to_vec()));
    assert_eq!(b, Some(b"data".to_vec()));
}

#[tokio::test]
async fn test_signed_out_makes_no_request() {
    let env = common::setup().await;

    let provider = env.dropbox();
    assert!(provider.download(SNAPSHOT).await.is_none());
    assert!(!provider.upload(SNAPSHOT, b"{}".to_vec()).await);
    assert!(provider.list_files("/").await.is_empty());
    assert!(!provider.delete_file(SNAPSHOT).await);

    let requests = env.server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}
