//! Tests for HttpAttestor::check_in().
//!
//! Uses wiremock for the reachable cases and a closed port for the
//! unreachable case.

use std::time::Duration;

use helm_attest::{Attestor, CheckInError, CheckInRequest, HttpAttestor};
use helm_core::{LicenseId, NodeId};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> CheckInRequest {
    CheckInRequest {
        node_id: NodeId::new("node-1").unwrap(),
        version: "0.1.0".to_string(),
        tier: "enterprise".to_string(),
        org: "Acme".to_string(),
    }
}

fn attestor(base: &str, timeout: Duration) -> HttpAttestor {
    let endpoint = format!("{base}/v1/check-in").parse().unwrap();
    HttpAttestor::new(endpoint, timeout).unwrap()
}

fn license() -> LicenseId {
    LicenseId::new("L1").unwrap()
}

#[tokio::test]
async fn check_in_posts_body_with_bearer_license_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/check-in"))
        .and(header("authorization", "Bearer L1"))
        .and(body_json(serde_json::json!({
            "nodeId": "node-1",
            "version": "0.1.0",
            "tier": "enterprise",
            "org": "Acme",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = attestor(&server.uri(), Duration::from_secs(5));
    client.check_in(&license(), &request()).await.unwrap();
}

#[tokio::test]
async fn any_2xx_is_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/check-in"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = attestor(&server.uri(), Duration::from_secs(5));
    assert!(client.check_in(&license(), &request()).await.is_ok());
}

#[tokio::test]
async fn non_2xx_is_rejected_with_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/check-in"))
        .respond_with(ResponseTemplate::new(403).set_body_string("license revoked"))
        .mount(&server)
        .await;

    let client = attestor(&server.uri(), Duration::from_secs(5));
    let err = client.check_in(&license(), &request()).await.unwrap_err();
    match err {
        CheckInError::Rejected { status, body, .. } => {
            assert_eq!(status, 403);
            assert_eq!(body, "license revoked");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_is_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = attestor(&server.uri(), Duration::from_secs(5));
    let err = client.check_in(&license(), &request()).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn unreachable_server_is_transport_failure() {
    // Port 1 is closed.
    let client = attestor("http://127.0.0.1:1", Duration::from_secs(5));
    let err = client.check_in(&license(), &request()).await.unwrap_err();
    assert!(
        matches!(err, CheckInError::Http { .. }),
        "expected Http error, got {err:?}"
    );
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = attestor(&server.uri(), Duration::from_millis(300));
    let err = client.check_in(&license(), &request()).await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn bearer_header_is_not_leaked_in_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let secret = LicenseId::new("secret-license-42").unwrap();
    let client = attestor(&server.uri(), Duration::from_secs(5));
    let err = client.check_in(&secret, &request()).await.unwrap_err();
    assert!(!err.to_string().contains("secret-license-42"));
    assert!(!format!("{err:?}").contains("secret-license-42"));
}
