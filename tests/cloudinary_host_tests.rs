//! Cloudinary host tests against a mocked API

use account_session::auth::media::{
    storage_id_from_url, CloudinaryHost, MediaBlob, MediaError, MediaHost,
};
use account_session::config::MediaConfig;
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

fn host(server: &MockServer) -> CloudinaryHost {
    CloudinaryHost::new(
        "demo",
        "key-123",
        "secret-456",
        server.base_url(),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn staged_blob(dir: &tempfile::TempDir) -> MediaBlob {
    let path = dir.path().join("staged-upload");
    std::fs::write(&path, b"\x89PNG fake image").unwrap();
    MediaBlob::new(path, "avatar.png").with_content_type("image/png")
}

#[tokio::test]
async fn test_upload_sends_signed_multipart() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1_1/demo/auto/upload")
                .body_contains("name=\"api_key\"")
                .body_contains("key-123")
                .body_contains("name=\"signature\"")
                .body_contains("name=\"timestamp\"")
                .body_contains("sha256")
                .body_contains("filename=\"avatar.png\"");
            then.status(200).json_body(json!({
                "public_id": "abc123",
                "secure_url": "https://res.cloudinary.com/demo/image/upload/v1700000000/abc123.png",
                "url": "http://res.cloudinary.com/demo/image/upload/v1700000000/abc123.png"
            }));
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let uploaded = host(&server).upload(&staged_blob(&dir)).await.unwrap();

    mock.assert_async().await;
    assert_eq!(uploaded.public_id, "abc123");
    assert!(uploaded.url.starts_with("https://"));
}

#[tokio::test]
async fn test_upload_rejection_carries_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1_1/demo/auto/upload");
            then.status(401)
                .json_body(json!({ "error": { "message": "Invalid Signature" } }));
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let result = host(&server).upload(&staged_blob(&dir)).await;

    match result {
        Err(MediaError::Rejected { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid Signature");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_missing_file() {
    let server = MockServer::start_async().await;
    let result = host(&server)
        .upload(&MediaBlob::new("/no/such/file", "a.png"))
        .await;
    assert!(matches!(result, Err(MediaError::Io { .. })));
}

#[tokio::test]
async fn test_destroy_uses_derived_public_id() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1_1/demo/image/destroy")
                .body_contains("public_id=avatars%2Fjane")
                .body_contains("api_key=key-123")
                .body_contains("signature_algorithm=sha256");
            then.status(200).json_body(json!({ "result": "ok" }));
        })
        .await;

    host(&server)
        .destroy("https://res.cloudinary.com/demo/image/upload/v1700000000/avatars/jane.png")
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_destroy_not_found_is_ok() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1_1/demo/image/destroy");
            then.status(200).json_body(json!({ "result": "not found" }));
        })
        .await;

    host(&server)
        .destroy("https://res.cloudinary.com/demo/image/upload/gone.png")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_destroy_unrecognized_url_makes_no_request() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({ "result": "ok" }));
        })
        .await;

    let result = host(&server).destroy("https://example.com/pic.png").await;
    assert!(matches!(result, Err(MediaError::UnrecognizedUrl(_))));
    assert_eq!(mock.hits_async().await, 0);
}

#[test]
fn test_storage_id_skips_version_segment() {
    let id = storage_id_from_url(
        "https://res.cloudinary.com/demo/image/upload/v12/users/42/avatar.final.jpg",
    )
    .unwrap();
    assert_eq!(id.resource_type, "image");
    assert_eq!(id.public_id, "users/42/avatar.final");
}

#[test]
fn test_from_config_requires_credentials() {
    let mut config = MediaConfig::default();
    assert!(CloudinaryHost::from_config(&config).unwrap().is_none());

    config.cloud_name = Some("demo".to_string());
    config.api_key = Some("key".to_string());
    config.api_secret = Some("secret".to_string());
    assert!(CloudinaryHost::from_config(&config).unwrap().is_some());
}
