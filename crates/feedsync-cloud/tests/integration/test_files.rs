//! Integration tests for Dropbox file operations

use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

use feedsync_core::ports::{FileDownload, IFileCloudServiceProvider};

use crate::common;

const SNAPSHOT: &str = "/feedsync_sync_data.json";

// ============================================================================
// Upload tests
// ============================================================================

#[tokio::test]
async fn test_upload_sends_overwrite_argument() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "token", "refresh").await;

    Mock::given(method("POST"))
        .and(path("/2/files/upload"))
        .and(header("Authorization", "Bearer token"))
        .and(header("Content-Type", "application/octet-stream"))
        .and(header_exists("Dropbox-API-Arg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "feedsync_sync_data.json",
            "path_display": SNAPSHOT
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    assert!(env.dropbox().upload(SNAPSHOT, b"{\"version\":2}".to_vec()).await);

    let requests = env.server.received_requests().await.unwrap();
    let request = &requests[0];
    assert_eq!(request.body, b"{\"version\":2}");

    let arg = request
        .headers
        .get("Dropbox-API-Arg")
        .unwrap()
        .to_str()
        .unwrap();
    let arg: serde_json::Value = serde_json::from_str(arg).unwrap();
    assert_eq!(
        arg,
        serde_json::json!({ "path": SNAPSHOT, "mode": "overwrite", "mute": true })
    );
}

#[tokio::test]
async fn test_upload_failure_returns_false() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "token", "refresh").await;

    Mock::given(method("POST"))
        .and(path("/2/files/upload"))
        .respond_with(ResponseTemplate::new(507).set_body_string("insufficient_space"))
        .mount(&env.server)
        .await;

    assert!(!env.dropbox().upload(SNAPSHOT, b"{}".to_vec()).await);
}

// ============================================================================
// Download tests
// ============================================================================

#[tokio::test]
async fn test_download_returns_content() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "token", "refresh").await;

    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"snapshot".to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(&env.server)
        .await;

    assert_eq!(
        env.dropbox().download(SNAPSHOT).await,
        Some(b"snapshot".to_vec())
    );
}

#[tokio::test]
async fn test_download_missing_file_returns_none() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "token", "refresh").await;

    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error_summary": "path/not_found/..",
            "error": { ".tag": "path", "path": { ".tag": "not_found" } }
        })))
        .expect(2)
        .mount(&env.server)
        .await;

    assert!(env.dropbox().download(SNAPSHOT).await.is_none());
    assert_eq!(env.dropbox().fetch_file(SNAPSHOT).await, FileDownload::NotFound);
}

#[tokio::test]
async fn test_download_server_error_returns_none() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "token", "refresh").await;

    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&env.server)
        .await;

    assert!(env.dropbox().download(SNAPSHOT).await.is_none());
    assert_eq!(env.dropbox().fetch_file(SNAPSHOT).await, FileDownload::Failed);
}

// ============================================================================
// List tests
// ============================================================================

#[tokio::test]
async fn test_list_files_filters_by_prefix() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "token", "refresh").await;

    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(body_json(serde_json::json!({
            "path": "",
            "recursive": false,
            "include_deleted": false,
            "include_media_info": false,
            "include_has_explicit_shared_members": false,
            "include_mounted_folders": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [
                { ".tag": "file", "name": "feedsync_sync_data.json", "path_display": "/feedsync_sync_data.json" },
                { ".tag": "file", "name": "feedsync_backup.json", "path_display": "/feedsync_backup.json" },
                { ".tag": "folder", "name": "Photos", "path_display": "/Photos" }
            ],
            "cursor": "c1",
            "has_more": false
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let files = env.dropbox().list_files("/feedsync").await;
    assert_eq!(
        files,
        vec!["/feedsync_sync_data.json", "/feedsync_backup.json"]
    );
}

#[tokio::test]
async fn test_list_files_error_returns_empty() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "token", "refresh").await;

    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&env.server)
        .await;

    assert!(env.dropbox().list_files("/").await.is_empty());
}

// ============================================================================
// Delete tests
// ============================================================================

#[tokio::test]
async fn test_delete_file() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "token", "refresh").await;

    Mock::given(method("POST"))
        .and(path("/2/files/delete_v2"))
        .and(body_json(serde_json::json!({ "path": SNAPSHOT })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "metadata": { ".tag": "file", "path_display": SNAPSHOT }
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    assert!(env.dropbox().delete_file(SNAPSHOT).await);
}

#[tokio::test]
async fn test_delete_missing_file_returns_false() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "token", "refresh").await;

    Mock::given(method("POST"))
        .and(path("/2/files/delete_v2"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error_summary": "path_lookup/not_found/..",
            "error": { ".tag": "path_lookup", "path_lookup": { ".tag": "not_found" } }
        })))
        .mount(&env.server)
        .await;

    assert!(!env.dropbox().delete_file(SNAPSHOT).await);
}

#[tokio::test]
async fn test_delete_404_returns_false() {
    let env = common::setup().await;
    common::sign_in_dropbox(&env, "token", "refresh").await;

    Mock::given(method("POST"))
        .and(path("/2/files/delete_v2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&env.server)
        .await;

    assert!(!env.dropbox().delete_file(SNAPSHOT).await);
}
