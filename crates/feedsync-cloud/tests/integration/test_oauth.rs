//! Integration tests for the PKCE authorization flow

use std::collections::HashMap;

use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use feedsync_cloud::CloudError;
use feedsync_core::config::PkceMethod;
use feedsync_core::domain::ServiceType;
use feedsync_core::ports::IUserRepository;

use crate::common;

fn query(url: &str) -> HashMap<String, String> {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

async fn mount_token_endpoint(env: &common::TestEnv, code: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains(format!("code={}", code)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "token_type": "bearer",
            "expires_in": 14400,
            "account_id": "dbid:abc"
        })))
        .mount(&env.server)
        .await;
}

// ============================================================================
// Authorization URL tests
// ============================================================================

#[tokio::test]
async fn test_auth_url_with_plain_pkce() {
    let env = common::setup().await;
    let oauth = env.oauth();

    let url = oauth.auth_url(ServiceType::Dropbox).unwrap();
    assert!(url.starts_with(&format!("{}/oauth2/authorize", env.server.uri())));

    let params = query(&url);
    assert_eq!(params["client_id"], common::CLIENT_ID);
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["scope"], "files.content.read files.content.write");
    assert_eq!(params["token_access_type"], "offline");
    assert_eq!(params["code_challenge_method"], "plain");
    assert_eq!(params["redirect_uri"], env.config.redirect_uri);
    assert_eq!(params["code_challenge"].len(), 43);
    assert!(!params["state"].is_empty());
    assert_eq!(oauth.pending_flows(), 1);
}

#[tokio::test]
async fn test_auth_url_with_s256_pkce() {
    let env = common::setup_with_pkce(PkceMethod::S256).await;

    let url = env.oauth().auth_url(ServiceType::Dropbox).unwrap();
    let params = query(&url);
    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(params["code_challenge"].len(), 43);
}

#[tokio::test]
async fn test_auth_url_requires_client_id() {
    let mut env = common::setup().await;
    env.config.client_id = None;

    let result = env.oauth().auth_url(ServiceType::Dropbox);
    assert!(matches!(result, Err(CloudError::NotConfigured(_))));
}

#[tokio::test]
async fn test_each_auth_url_gets_its_own_state() {
    let env = common::setup().await;
    let oauth = env.oauth();

    let first = query(&oauth.auth_url(ServiceType::Dropbox).unwrap());
    let second = query(&oauth.auth_url(ServiceType::Dropbox).unwrap());
    assert_ne!(first["state"], second["state"]);
    assert_ne!(first["code_challenge"], second["code_challenge"]);
    assert_eq!(oauth.pending_flows(), 2);
}

// ============================================================================
// Redirect handling tests
// ============================================================================

#[tokio::test]
async fn test_handle_redirect_stores_tokens() {
    let env = common::setup().await;
    mount_token_endpoint(&env, "the-code").await;
    let oauth = env.oauth();

    let params = query(&oauth.auth_url(ServiceType::Dropbox).unwrap());
    let verifier = &params["code_challenge"];

    let redirect = format!(
        "{}?code=the-code&state={}",
        env.config.redirect_uri, params["state"]
    );
    assert!(oauth.handle_redirect(&redirect).await);
    assert_eq!(oauth.pending_flows(), 0);

    let requests = env.server.received_requests().await.unwrap();
    let form = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(form.contains(&format!("code_verifier={}", verifier)));
    assert!(form.contains(&format!("client_id={}", common::CLIENT_ID)));

    let user = env.store.user(ServiceType::Dropbox).await.unwrap().unwrap();
    assert_eq!(user.id, "1");
    assert_eq!(user.name, "Dropbox User");
    assert_eq!(user.email, "user@dropbox");
    assert_eq!(user.token, "access-1");
    assert_eq!(user.refresh_token.as_deref(), Some("refresh-1"));
    assert!(user.server_url.is_none());
}

#[tokio::test]
async fn test_handle_redirect_with_fragment() {
    let env = common::setup().await;
    mount_token_endpoint(&env, "frag-code").await;
    let oauth = env.oauth();

    let params = query(&oauth.auth_url(ServiceType::Dropbox).unwrap());
    let redirect = format!("feedsync://oauth#code=frag-code&state={}", params["state"]);

    assert!(oauth.handle_redirect(&redirect).await);
}

#[tokio::test]
async fn test_handle_redirect_unknown_state_fails() {
    let env = common::setup().await;
    mount_token_endpoint(&env, "the-code").await;
    let oauth = env.oauth();

    oauth.auth_url(ServiceType::Dropbox).unwrap();
    let redirect = format!("{}?code=the-code&state=forged", env.config.redirect_uri);

    assert!(!oauth.handle_redirect(&redirect).await);
    assert_eq!(oauth.pending_flows(), 1);
    assert!(env.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_handle_redirect_missing_code_fails() {
    let env = common::setup().await;
    let oauth = env.oauth();

    let params = query(&oauth.auth_url(ServiceType::Dropbox).unwrap());
    let redirect = format!(
        "{}?error=access_denied&state={}",
        env.config.redirect_uri, params["state"]
    );

    assert!(!oauth.handle_redirect(&redirect).await);
    assert_eq!(oauth.pending_flows(), 1);
}

#[tokio::test]
async fn test_handle_redirect_exchange_failure_keeps_flow() {
    let env = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .mount(&env.server)
        .await;
    let oauth = env.oauth();

    let params = query(&oauth.auth_url(ServiceType::Dropbox).unwrap());
    let redirect = format!("{}?code=bad&state={}", env.config.redirect_uri, params["state"]);

    assert!(!oauth.handle_redirect(&redirect).await);
    assert_eq!(oauth.pending_flows(), 1);
    assert!(env.store.user(ServiceType::Dropbox).await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_flows_complete_independently() {
    let env = common::setup().await;
    mount_token_endpoint(&env, "second-code").await;
    let oauth = env.oauth();

    let first = query(&oauth.auth_url(ServiceType::Dropbox).unwrap());
    let second = query(&oauth.auth_url(ServiceType::Dropbox).unwrap());

    let redirect = format!(
        "{}?code=second-code&state={}",
        env.config.redirect_uri, second["state"]
    );
    assert!(oauth.handle_redirect(&redirect).await);
    assert_eq!(oauth.pending_flows(), 1);

    // The first flow is still pending and can be completed later
    let stale = format!(
        "{}?code=second-code&state={}",
        env.config.redirect_uri, second["state"]
    );
    assert!(!oauth.handle_redirect(&stale).await);
    assert_ne!(first["state"], second["state"]);
}
