mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{client, AUTH_TOKEN};
use rk_api::{ApiClient, AuthSource, RetryConfig};
use rk_core::constants;
use rk_core::error::RkError;
use rk_core::kv::{KeyValueStore, MemoryStore};

#[tokio::test]
async fn test_unread_count_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/unread-count"))
        .and(header("authorization", format!("Bearer {AUTH_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 4})))
        .expect(1)
        .mount(&server)
        .await;

    let count = client(&server).unread_chat_count().await.unwrap();
    assert_eq!(count, 4);
}

#[tokio::test]
async fn test_pending_count_missing_field_is_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bookings/pending-count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let count = client(&server).pending_requests_count().await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_register_fcm_token_posts_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/fcm-token"))
        .and(body_json(json!({"fcmToken": "device-token"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).register_fcm_token("device-token").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].headers.get("content-type").map(|v| v.to_str().unwrap()),
        Some("application/json")
    );
}

#[tokio::test]
async fn test_store_token_read_per_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/unread-count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 1})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let api = ApiClient::new(&common::api_root(&server), std::time::Duration::from_secs(5))
        .unwrap()
        .with_auth(AuthSource::Store(store.clone()));

    api.unread_chat_count().await.unwrap();
    store.set(constants::AUTH_TOKEN_KEY, "fresh-login").unwrap();
    api.unread_chat_count().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
    assert_eq!(
        requests[1].headers.get("authorization").map(|v| v.to_str().unwrap()),
        Some("Bearer fresh-login")
    );
}

#[tokio::test]
async fn test_retry_on_503_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/unread-count"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/chats/unread-count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 2})))
        .mount(&server)
        .await;

    let count = client(&server).unread_chat_count().await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid token"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).unread_chat_count().await.unwrap_err();
    match err {
        RkError::AuthFailed(message) => assert_eq!(message, "Invalid token"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_client_error_carries_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/fcm-token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid request body"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .with_retry_config(RetryConfig::none())
        .register_fcm_token("t")
        .await
        .unwrap_err();
    match err {
        RkError::ServerError { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid request body");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
