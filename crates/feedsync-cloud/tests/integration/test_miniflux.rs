//! Integration tests for the Miniflux aggregator client

use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use feedsync_core::domain::Feed;
use feedsync_core::ports::IAggregatorApi;

use crate::common;

#[tokio::test]
async fn test_subscriptions() {
    let env = common::setup().await;
    common::sign_in_miniflux(&env, "api-key").await;

    Mock::given(method("GET"))
        .and(path("/v1/feeds"))
        .and(header("X-Auth-Token", "api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": 42,
                "title": "Example",
                "feed_url": "https://example.org/feed.xml",
                "site_url": "https://example.org",
                "category": { "id": 1, "title": "All" }
            }
        ])))
        .expect(1)
        .mount(&env.server)
        .await;

    let subscriptions = env.miniflux().subscriptions().await.unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].remote_id, "42");
    assert_eq!(subscriptions[0].feed_url, "https://example.org/feed.xml");
}

#[tokio::test]
async fn test_feed_entries() {
    let env = common::setup().await;
    common::sign_in_miniflux(&env, "api-key").await;

    Mock::given(method("GET"))
        .and(path("/v1/feeds/42/entries"))
        .and(query_param("order", "published_at"))
        .and(query_param("direction", "desc"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 2,
            "entries": [
                {
                    "id": 7,
                    "url": "https://example.org/7",
                    "title": "Seven",
                    "content": "<p>7</p>",
                    "published_at": "2026-03-02T09:00:00Z",
                    "status": "unread",
                    "starred": false
                },
                {
                    "id": 6,
                    "url": "https://example.org/6",
                    "title": "Six",
                    "content": "",
                    "published_at": "2026-03-01T09:00:00Z",
                    "status": "read",
                    "starred": true
                }
            ]
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let mut feed = Feed::new("local-1", "Example", "https://example.org/feed.xml");
    feed.remote_id = Some("42".to_string());

    let payload = env.miniflux().feed_entries(&feed).await.unwrap();
    assert_eq!(payload.name, "Example");
    assert_eq!(payload.posts.len(), 2);
    assert_eq!(payload.posts[0].remote_id.as_deref(), Some("7"));
    assert!(!payload.posts[0].read);
    assert!(payload.posts[1].read);
    assert!(payload.posts[1].starred);
}

#[tokio::test]
async fn test_feed_entries_requires_remote_id() {
    let env = common::setup().await;
    common::sign_in_miniflux(&env, "api-key").await;

    let feed = Feed::new("local-1", "Example", "https://example.org/feed.xml");
    assert!(env.miniflux().feed_entries(&feed).await.is_err());
}

#[tokio::test]
async fn test_update_entries_status() {
    let env = common::setup().await;
    common::sign_in_miniflux(&env, "api-key").await;

    Mock::given(method("PUT"))
        .and(path("/v1/entries"))
        .and(body_json(serde_json::json!({ "entry_ids": [1, 2], "status": "read" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&env.server)
        .await;

    env.miniflux()
        .update_entries_status(&["1".to_string(), "2".to_string()], true)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_entries_status_skips_empty() {
    let env = common::setup().await;
    common::sign_in_miniflux(&env, "api-key").await;

    env.miniflux().update_entries_status(&[], false).await.unwrap();
    assert!(env.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unauthorized_is_an_error() {
    let env = common::setup().await;
    common::sign_in_miniflux(&env, "wrong-key").await;

    Mock::given(method("GET"))
        .and(path("/v1/feeds"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error_message": "Access Unauthorized"
        })))
        .mount(&env.server)
        .await;

    assert!(env.miniflux().subscriptions().await.is_err());
}

#[tokio::test]
async fn test_signed_out_is_an_error() {
    let env = common::setup().await;
    assert!(env.miniflux().subscriptions().await.is_err());
}
