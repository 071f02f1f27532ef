//! Scenario: the access gate against a mocked identity endpoint.
//!
//! Every test drives `AccessGate::verify` through `HttpIdentitySource`
//! against an `httpmock` server, so the full request path is exercised.

use std::time::Duration;

use httpmock::prelude::*;
use jcr_config::SessionToken;
use jcr_gate::{AccessGate, DenialReason, GateDecision, HttpIdentitySource, RoutePermissions};
use serde_json::json;

fn gate_for(server: &MockServer, timeout: Duration) -> AccessGate<HttpIdentitySource> {
    let source = HttpIdentitySource::new(
        server.url("/api/auth/verify"),
        Some(SessionToken::new("tok-123")),
    );
    AccessGate::new(source, timeout)
}

#[tokio::test]
async fn granted_when_permission_present() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/auth/verify")
                .header("authorization", "Bearer tok-123");
            then.status(200).json_body(json!({
                "user": { "username": "abcd12" },
                "permissions": ["bar.manage"]
            }));
        })
        .await;

    let d = gate_for(&server, Duration::from_secs(5))
        .verify("bar.manage")
        .await;

    mock.assert_hits_async(1).await;
    match d {
        GateDecision::Granted { user } => assert_eq!(user.unwrap().username, "abcd12"),
        other => panic!("expected grant, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_permissions_denied_403() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/auth/verify");
            then.status(200).json_body(json!({ "permissions": [] }));
        })
        .await;

    let d = gate_for(&server, Duration::from_secs(5))
        .verify("bar.manage")
        .await;
    assert_eq!(d.redirect_status(), Some(403));
}

#[tokio::test]
async fn absent_permissions_denied_403() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/auth/verify");
            then.status(200).json_body(json!({ "user": { "username": "abcd12" } }));
        })
        .await;

    let d = gate_for(&server, Duration::from_secs(5))
        .verify("bar.manage")
        .await;
    assert_eq!(
        d,
        GateDecision::Denied {
            status: 403,
            reason: DenialReason::NoPermissions
        }
    );
}

#[tokio::test]
async fn server_failure_status_is_carried_through() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/auth/verify");
            then.status(401).body("session expired");
        })
        .await;

    let d = gate_for(&server, Duration::from_secs(5))
        .verify("bar.manage")
        .await;
    assert_eq!(
        d,
        GateDecision::Denied {
            status: 401,
            reason: DenialReason::VerifyFailed
        }
    );
    if let GateDecision::Denied { reason, .. } = d {
        assert_eq!(reason.message(), "Unable to verify admin status");
    }
}

#[tokio::test]
async fn malformed_body_fails_closed_with_default_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/auth/verify");
            then.status(200).body("<html>login</html>");
        })
        .await;

    let d = gate_for(&server, Duration::from_secs(5))
        .verify("bar.manage")
        .await;
    assert_eq!(d.redirect_status(), Some(jcr_gate::DEFAULT_FAILURE_STATUS));
}

#[tokio::test]
async fn unreachable_endpoint_uses_default_status() {
    // Port 9 (discard) on loopback is not listening in test environments.
    let source = HttpIdentitySource::new("http://127.0.0.1:9/api/auth/verify", None);
    let d = AccessGate::new(source, Duration::from_secs(5))
        .verify("bar.manage")
        .await;
    assert_eq!(
        d,
        GateDecision::Denied {
            status: 500,
            reason: DenialReason::VerifyFailed
        }
    );
}

#[tokio::test]
async fn slow_endpoint_times_out_as_408() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/auth/verify");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({ "permissions": ["bar.manage"] }));
        })
        .await;

    let d = gate_for(&server, Duration::from_millis(100))
        .verify("bar.manage")
        .await;
    assert_eq!(
        d,
        GateDecision::Denied {
            status: jcr_gate::TIMEOUT_STATUS,
            reason: DenialReason::VerifyFailed
        }
    );
}

#[tokio::test]
async fn unknown_route_is_denied_without_lookup() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/auth/verify");
            then.status(200).json_body(json!({ "permissions": ["bar.manage"] }));
        })
        .await;

    let routes = RoutePermissions::with_defaults();
    let d = gate_for(&server, Duration::from_secs(5))
        .verify_route(&routes, "/admin/not-a-page")
        .await;

    mock.assert_hits_async(0).await;
    assert_eq!(
        d,
        GateDecision::Denied {
            status: 403,
            reason: DenialReason::UnknownRoute
        }
    );
}

#[tokio::test]
async fn every_verify_performs_a_fresh_lookup() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/auth/verify");
            then.status(200).json_body(json!({ "permissions": ["toastie.manage"] }));
        })
        .await;

    let gate = gate_for(&server, Duration::from_secs(5));
    let routes = RoutePermissions::with_defaults();
    assert!(gate.verify_route(&routes, "/admin/toastie/live").await.is_granted());
    assert!(gate.verify_route(&routes, "/admin/toastie").await.is_granted());
    mock.assert_hits_async(2).await;
}
