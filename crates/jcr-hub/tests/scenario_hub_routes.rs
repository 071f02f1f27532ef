//! In-process scenario tests for jcr-hub HTTP endpoints.
//!
//! These tests drive `routes::build_router` via `tower::ServiceExt::oneshot`
//! without binding a socket. WebSocket flows are covered by the live channel
//! scenarios, which need a real listener.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use jcr_hub::{routes, state};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state() -> Arc<state::HubState> {
    let tokens = state::parse_token_table("ab12:tok-admin=bar.manage,toastie.manage;cd34:tok-none=")
        .expect("token table");
    Arc::new(state::HubState::new(tokens))
}

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let (status, body) = call(routes::build_router(make_state()), get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "jcr-hub");
}

// ---------------------------------------------------------------------------
// GET /api/auth/verify
// ---------------------------------------------------------------------------

#[tokio::test]
async fn verify_without_token_is_401() {
    let (status, body) = call(routes::build_router(make_state()), get("/api/auth/verify")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(parse_json(body)["error"], "Not signed in");
}

#[tokio::test]
async fn verify_unknown_token_is_401() {
    let req = Request::builder()
        .uri("/api/auth/verify")
        .header("authorization", "Bearer nope")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = call(routes::build_router(make_state()), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verify_known_token_returns_identity_and_permissions() {
    let req = Request::builder()
        .uri("/api/auth/verify")
        .header("authorization", "Bearer tok-admin")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = call(routes::build_router(make_state()), req).await;
    assert_eq!(status, StatusCode::OK);

    let v: jcr_schemas::VerifyResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(v.user.as_ref().unwrap().username, "ab12");
    assert_eq!(v.permissions(), ["bar.manage", "toastie.manage"]);
}

#[tokio::test]
async fn verify_token_without_permissions_returns_empty_list() {
    let req = Request::builder()
        .uri("/api/auth/verify")
        .header("authorization", "Bearer tok-none")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = call(routes::build_router(make_state()), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["permissions"], serde_json::json!([]));
}

// ---------------------------------------------------------------------------
// /api/:bar/orders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn placed_order_is_listed_until_completed() {
    let st = make_state();

    let req = Request::builder()
        .method("POST")
        .uri("/api/toastie/orders")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(r#"{"payload":{"item":"cheese"}}"#))
        .unwrap();
    let (status, body) = call(routes::build_router(Arc::clone(&st)), req).await;
    assert_eq!(status, StatusCode::CREATED);
    let placed = parse_json(body);
    assert_eq!(placed["payload"]["item"], "cheese");
    assert!(placed["completed_at"].is_null());

    let (status, body) = call(routes::build_router(Arc::clone(&st)), get("/api/toastie/orders")).await;
    assert_eq!(status, StatusCode::OK);
    let listed = parse_json(body);
    assert_eq!(listed["bar"], "toastie");
    assert_eq!(listed["open"], false);
    assert_eq!(listed["orders"].as_array().unwrap().len(), 1);

    let id = jcr_schemas::OrderId(placed["id"].as_u64().unwrap());
    st.complete_order(jcr_schemas::BarKind::Toastie, id)
        .await
        .unwrap();

    let (_, body) = call(routes::build_router(Arc::clone(&st)), get("/api/toastie/orders")).await;
    assert!(parse_json(body)["orders"].as_array().unwrap().is_empty());

    // Drinks board is untouched.
    let (_, body) = call(routes::build_router(st), get("/api/drinks/orders")).await;
    assert!(parse_json(body)["orders"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_bar_is_404() {
    let (status, body) = call(routes::build_router(make_state()), get("/api/kebab/orders")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap()
        .contains("unknown bar"));
}

#[tokio::test]
async fn bar_alias_resolves() {
    let (status, body) = call(routes::build_router(make_state()), get("/api/bar/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["bar"], "drinks");
}
