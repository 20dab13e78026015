#![allow(clippy::unwrap_used)]
// Integration tests for `TokenManager` against a mocked B2C token endpoint.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use anthem_api::{AuthConfig, Error, TokenManager, TokenState, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, TokenManager) {
    let server = MockServer::start().await;
    let manager = manager_for(&format!("{}/token", server.uri()));
    (server, manager)
}

fn manager_for(token_url: &str) -> TokenManager {
    let mut config = AuthConfig::new(
        "me@example.com",
        "hunter2".to_string().into(),
        "client-app",
        "api-resource",
    );
    config.token_url = Some(Url::parse(token_url).unwrap());
    let transport = TransportConfig {
        timeout: Duration::from_secs(5),
        ..TransportConfig::default()
    };
    TokenManager::new(config, &transport).unwrap()
}

fn token_body(access: &str, refresh: Option<&str>, expires_in: serde_json::Value) -> serde_json::Value {
    let mut body = json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": expires_in,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    body
}

// ── Password grant ──────────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_sends_password_grant() {
    let (server, manager) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("client_id=client-app"))
        .and(body_string_contains("username=me%40example.com"))
        .and(body_string_contains("password=hunter2"))
        .and(body_string_contains("offline_access"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("tok-1", Some("ref-1"), json!(3600))),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(manager.state().await, TokenState::Unauthenticated);

    let credential = manager.authenticate().await.unwrap();
    assert_eq!(credential.access_token.expose_secret(), "tok-1");
    assert_eq!(credential.refresh_token.unwrap().expose_secret(), "ref-1");
    assert_eq!(manager.state().await, TokenState::Valid);
}

#[tokio::test]
async fn test_rejected_credentials_surface_description() {
    let (server, manager) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid credentials"
        })))
        .mount(&server)
        .await;

    let err = manager.authenticate().await.unwrap_err();
    assert!(
        matches!(err, Error::Authentication { status: Some(401), .. }),
        "expected Authentication 401, got: {err:?}"
    );
    assert!(err.to_string().contains("Invalid credentials"));
    assert!(err.raw_body().unwrap().contains("invalid_grant"));
    assert_eq!(manager.state().await, TokenState::Unauthenticated);
}

#[tokio::test]
async fn test_unreachable_token_endpoint_is_authentication_error() {
    let manager = manager_for("http://127.0.0.1:9/token");

    let err = manager.ensure_valid().await.unwrap_err();
    assert!(
        matches!(err, Error::Authentication { status: None, .. }),
        "expected Authentication without status, got: {err:?}"
    );
}

#[tokio::test]
async fn test_string_expires_in_is_honored() {
    let (server, manager) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("tok", None, json!("60"))),
        )
        .mount(&server)
        .await;

    manager.authenticate().await.unwrap();
    // Sixty seconds is inside the renewal margin.
    assert_eq!(manager.state().await, TokenState::NearExpiry);
}

// ── ensure_valid ────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_callers_share_one_token_request() {
    let (server, manager) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("shared", Some("r"), json!(3600)))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manager = Arc::new(manager);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.ensure_valid().await })
        })
        .collect();

    for handle in handles {
        let credential = handle.await.unwrap().unwrap();
        assert_eq!(credential.access_token.expose_secret(), "shared");
    }
}

#[tokio::test]
async fn test_valid_credential_is_reused() {
    let (server, manager) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("tok", Some("r"), json!(3600))),
        )
        .expect(1)
        .mount(&server)
        .await;

    manager.ensure_valid().await.unwrap();
    manager.ensure_valid().await.unwrap();
}

#[tokio::test]
async fn test_near_expiry_refreshes() {
    let (server, manager) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("old", Some("ref-1"), json!(60))),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=ref-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("new", Some("ref-2"), json!(3600))),
        )
        .expect(1)
        .mount(&server)
        .await;

    manager.authenticate().await.unwrap();
    let credential = manager.ensure_valid().await.unwrap();
    assert_eq!(credential.access_token.expose_secret(), "new");
    assert_eq!(manager.state().await, TokenState::Valid);
}

#[tokio::test]
async fn test_rejected_refresh_falls_back_to_password_grant() {
    let (server, manager) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("pw", Some("stale"), json!(3600))),
        )
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "refresh token expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    manager.authenticate().await.unwrap();
    let credential = manager.refresh().await.unwrap();
    assert_eq!(credential.access_token.expose_secret(), "pw");
}

#[tokio::test]
async fn test_refresh_without_refresh_token_fails() {
    let (server, manager) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("tok", None, json!(3600))),
        )
        .mount(&server)
        .await;

    let err = manager.refresh().await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }));

    manager.authenticate().await.unwrap();
    let err = manager.refresh().await.unwrap_err();
    assert!(matches!(err, Error::Authentication { status: None, .. }));
}

#[tokio::test]
async fn test_clear_forgets_credential() {
    let (server, manager) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("tok", Some("r"), json!(3600))),
        )
        .expect(2)
        .mount(&server)
        .await;

    manager.ensure_valid().await.unwrap();
    manager.clear().await;
    manager.clear().await;
    assert_eq!(manager.state().await, TokenState::Unauthenticated);
    assert!(manager.credential().await.is_none());

    manager.ensure_valid().await.unwrap();
}
