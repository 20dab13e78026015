#![allow(clippy::unwrap_used)]
// Integration tests for the `Controller` session lifecycle using wiremock.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use anthem_core::{
    AccountCredentials, Command, ConnectionState, Controller, ControllerConfig, CoreError,
    TokenState,
};

const CUSTOMER_PATH: &str = "/devices/api/v1/device-management/customer-device/cust-1";
const PRESET_PATH: &str = "/platform/api/v1/commands/gcs/controlpresetorexperience";

// ── Helpers ─────────────────────────────────────────────────────────

fn config_for(server: &MockServer) -> ControllerConfig {
    let mut config = ControllerConfig::new(
        Url::parse(&server.uri()).unwrap(),
        SecretString::from("sub-key"),
        AccountCredentials {
            username: "me@example.com".into(),
            password: SecretString::from("pw"),
        },
        "client",
        "res",
    );
    config.token_url = Some(Url::parse(&format!("{}/token", server.uri())).unwrap());
    config.customer_id = Some("cust-1".into());
    config.realtime_enabled = false;
    config
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "e30.e30.sig",
            "refresh_token": "r",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

async fn mount_account(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(CUSTOMER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cust-1",
            "customerHome": [
                { "homeId": "h1", "devices": [ { "deviceId": "d1", "logicalName": "Main" } ] },
                { "homeId": "h2", "devices": [ { "deviceId": "d1" }, { "deviceId": "d2", "sku": "GCS2" } ] }
            ]
        })))
        .mount(server)
        .await;
}

async fn setup() -> (MockServer, Controller) {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_account(&server).await;
    let controller = Controller::new(config_for(&server)).unwrap();
    (server, controller)
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_open_loads_account() {
    let (_server, controller) = setup().await;
    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Disconnected);

    controller.open().await.unwrap();

    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Connected);
    assert_eq!(controller.customer_id().await.unwrap(), "cust-1");
    assert_eq!(controller.token_state().await, TokenState::Valid);

    let ids: Vec<String> = controller
        .devices()
        .await
        .into_iter()
        .map(|d| d.device_id)
        .collect();
    assert_eq!(ids, vec!["d1".to_string(), "d2".to_string()]);

    controller.close().await;
}

#[tokio::test]
async fn test_open_failure_marks_session_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid credentials"
        })))
        .mount(&server)
        .await;

    let controller = Controller::new(config_for(&server)).unwrap();
    let err = controller.open().await.unwrap_err();

    assert!(
        matches!(err, CoreError::AuthenticationFailed { status: Some(401), .. }),
        "expected AuthenticationFailed, got: {err:?}"
    );
    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Failed);
}

#[tokio::test]
async fn test_concurrent_open_establishes_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "e30.e30.sig",
            "refresh_token": "r",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CUSTOMER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cust-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let controller = Controller::new(config_for(&server)).unwrap();
    let (first, second) = tokio::join!(controller.open(), controller.open());
    first.unwrap();
    second.unwrap();
    assert!(controller.is_open());

    controller.close().await;
    server.verify().await;
}

#[tokio::test]
async fn test_close_forgets_session() {
    let (_server, controller) = setup().await;
    controller.open().await.unwrap();
    controller.close().await;

    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Disconnected);
    assert_eq!(controller.token_state().await, TokenState::Unauthenticated);
    assert!(controller.account().await.is_none());

    let err = controller
        .execute(Command::TurnOff {
            device_id: "d1".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Disconnected));

    // A closed session can be opened again.
    controller.open().await.unwrap();
    assert!(controller.is_open());
    controller.close().await;
}

#[tokio::test]
async fn test_realtime_registration_failure_is_not_fatal() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_account(&server).await;
    Mock::given(method("POST"))
        .and(path("/platform/api/v1/mobile/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.realtime_enabled = true;
    let controller = Controller::new(config).unwrap();

    controller.open().await.unwrap();
    assert!(controller.is_open());
    assert!(!controller.has_realtime());
    controller.close().await;
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_execute_before_open_is_rejected() {
    let (_server, controller) = setup().await;

    let err = controller
        .execute(Command::StartPreset {
            device_id: "d1".into(),
            preset_id: 1,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Disconnected));
}

#[tokio::test]
async fn test_execute_uses_device_sku() {
    let (server, controller) = setup().await;

    Mock::given(method("POST"))
        .and(path(PRESET_PATH))
        .and(body_json(json!({
            "tenantId": "cust-1",
            "deviceId": "d2",
            "presetId": "4",
            "command": "start",
            "sku": "GCS2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "correlationId": "corr-9",
            "timestamp": 1_700_000_000
        })))
        .expect(1)
        .mount(&server)
        .await;

    controller.open().await.unwrap();
    let result = controller
        .execute(Command::StartPreset {
            device_id: "d2".into(),
            preset_id: 4,
        })
        .await
        .unwrap();
    assert_eq!(result.ack().correlation_id, "corr-9");

    controller.close().await;
}

#[tokio::test]
async fn test_unknown_device_is_rejected_locally() {
    let (server, controller) = setup().await;

    Mock::given(method("POST"))
        .and(path(PRESET_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    controller.open().await.unwrap();
    let err = controller
        .execute(Command::StopPreset {
            device_id: "nope".into(),
            preset_id: 1,
        })
        .await
        .unwrap_err();
    assert!(
        matches!(err, CoreError::DeviceNotFound { ref identifier } if identifier == "nope"),
        "expected DeviceNotFound, got: {err:?}"
    );

    controller.close().await;
}

#[tokio::test]
async fn test_oneshot_runs_and_closes() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_account(&server).await;

    let count = Controller::oneshot(config_for(&server), |c| async move {
        Ok(c.devices().await.len())
    })
    .await
    .unwrap();
    assert_eq!(count, 2);
}
