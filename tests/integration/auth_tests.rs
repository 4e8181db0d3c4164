//! Token manager tests against a stubbed OAuth2 token endpoint.

use crate::common::{TOKEN_PATH, mount_token_endpoint, test_credentials};
use cloudsaver::SaverError;
use cloudsaver::cloud::gcp::{Credentials, TokenManager};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_manager(server: &MockServer) -> TokenManager {
    let token_uri = format!("{}{}", server.uri(), TOKEN_PATH);
    TokenManager::new(test_credentials(&token_uri)).expect("construct token manager")
}

#[tokio::test]
async fn test_token_exchange_sends_jwt_bearer_form() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("jwt-bearer"))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-token-1",
            "expires_in": 3600,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = token_manager(&server);
    let token = manager.get_token().await.unwrap();
    assert_eq!(token, "access-token-1");
}

#[tokio::test]
async fn test_token_is_cached_across_calls() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;

    let manager = token_manager(&server);
    assert_eq!(manager.get_token().await.unwrap(), "access-token-1");
    // Second call must be served from the cache; expect(1) verifies the
    // endpoint was hit exactly once when the server drops.
    assert_eq!(manager.get_token().await.unwrap(), "access-token-1");
}

#[tokio::test]
async fn test_concurrent_callers_share_one_exchange() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;

    let manager = Arc::new(token_manager(&server));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move { manager.get_token().await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "access-token-1");
    }
}

#[tokio::test]
async fn test_short_lived_token_is_refreshed() {
    let server = MockServer::start().await;

    // A 30s lifetime lands entirely inside the expiry skew, so the second
    // call must refresh.
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "short-token",
            "expires_in": 30,
            "token_type": "Bearer",
        })))
        .expect(2)
        .mount(&server)
        .await;

    let manager = token_manager(&server);
    assert_eq!(manager.get_token().await.unwrap(), "short-token");
    assert_eq!(manager.get_token().await.unwrap(), "short-token");
}

#[tokio::test]
async fn test_absurd_expires_in_is_clamped_not_overflowed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-token-1",
            "expires_in": u64::MAX,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = token_manager(&server);
    assert_eq!(manager.get_token().await.unwrap(), "access-token-1");
    // Still a usable cached token, just with a bounded expiry.
    assert_eq!(manager.get_token().await.unwrap(), "access-token-1");
}

#[tokio::test]
async fn test_non_success_status_is_an_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let manager = token_manager(&server);
    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(err, SaverError::Auth(_)), "got {err:?}");
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_empty_access_token_is_an_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "",
            "expires_in": 3600,
        })))
        .mount(&server)
        .await;

    let manager = token_manager(&server);
    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(err, SaverError::Auth(_)), "got {err:?}");
}

#[tokio::test]
async fn test_invalid_private_key_fails_at_construction() {
    let credentials = Credentials::from_private_key("not a pem key");
    assert!(TokenManager::new(credentials).is_err());
}
