//! Axum router and all HTTP / WebSocket handlers for jcr-hub.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests compose the bare router directly.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use jcr_schemas::{BarKind, ClientMessage, ServerMessage, VerifyResponse};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::{
    api_types::{BarOrdersResponse, ErrorResponse, HealthResponse, PlaceOrderRequest},
    codec,
    state::{Completion, HubState},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<HubState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/api/auth/verify", get(verify))
        .route("/api/:bar/orders", get(list_orders).post(place_order))
        .route("/live", get(live))
        .with_state(state)
}

fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(msg))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

fn parse_bar(raw: &str) -> Result<BarKind, Response> {
    raw.parse::<BarKind>()
        .map_err(|e| error(StatusCode::NOT_FOUND, e.to_string()))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<HubState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /api/auth/verify
// ---------------------------------------------------------------------------

/// Identity + permissions for the bearer token. Unknown or missing token -> 401.
pub(crate) async fn verify(State(st): State<Arc<HubState>>, headers: HeaderMap) -> Response {
    let token = bearer(&headers);
    match token.and_then(|t| st.identity(t)) {
        Some(identity) => (StatusCode::OK, Json(identity.clone())).into_response(),
        None => {
            debug!(has_token = token.is_some(), "auth/verify refused");
            error(StatusCode::UNAUTHORIZED, "Not signed in")
        }
    }
}

// ---------------------------------------------------------------------------
// GET|POST /api/:bar/orders
// ---------------------------------------------------------------------------

pub(crate) async fn list_orders(
    State(st): State<Arc<HubState>>,
    Path(bar): Path<String>,
) -> Response {
    let bar = match parse_bar(&bar) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let state = st.bar(bar).await;
    (
        StatusCode::OK,
        Json(BarOrdersResponse {
            bar,
            open: state.open,
            orders: state.outstanding(),
        }),
    )
        .into_response()
}

pub(crate) async fn place_order(
    State(st): State<Arc<HubState>>,
    Path(bar): Path<String>,
    Json(req): Json<PlaceOrderRequest>,
) -> Response {
    let bar = match parse_bar(&bar) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let order = st.place_order(bar, req.payload).await;
    info!(bar = %bar, order_id = %order.id, "order placed");
    (StatusCode::CREATED, Json(order)).into_response()
}

// ---------------------------------------------------------------------------
// GET /live  (WebSocket)
// ---------------------------------------------------------------------------

/// Upgrade requires a known bearer token (401 otherwise). The bar's manage
/// permission is checked when the client subscribes.
pub(crate) async fn live(
    State(st): State<Arc<HubState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match bearer(&headers).and_then(|t| st.identity(t)) {
        Some(identity) => identity.clone(),
        None => {
            debug!(has_token = bearer(&headers).is_some(), "live upgrade refused");
            return error(StatusCode::UNAUTHORIZED, "Not signed in");
        }
    };
    ws.on_upgrade(move |socket| live_session(socket, st, identity))
}

/// One subscriber: wait for `subscribe`, send the snapshot, then interleave
/// bus frames for that bar with client requests until either side closes.
async fn live_session(socket: WebSocket, st: Arc<HubState>, identity: VerifyResponse) {
    let (mut tx, mut rx) = socket.split();
    let user = identity
        .user
        .as_ref()
        .map(|u| u.username.clone())
        .unwrap_or_else(|| "-".to_string());

    let bar = loop {
        match rx.next().await {
            Some(Ok(Message::Text(text))) => match codec::decode_client(&text) {
                Ok(ClientMessage::Subscribe { bar }) => break bar,
                Ok(other) => warn!(frame = ?other, "request before subscribe; ignoring"),
                Err(e) => warn!(error = %e, "undecodable client frame; ignoring"),
            },
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            Some(Ok(_)) => {}
        }
    };

    if !identity
        .permissions()
        .iter()
        .any(|p| p == bar.manage_permission())
    {
        warn!(bar = %bar, user = %user, "subscribe refused; missing permission");
        let _ = tx
            .send(Message::Close(Some(CloseFrame {
                code: close_code::POLICY,
                reason: "forbidden".into(),
            })))
            .await;
        return;
    }

    let (snapshot, bus_rx) = st.subscribe(bar).await;
    if send_frame(&mut tx, &snapshot).await.is_err() {
        return;
    }
    info!(bar = %bar, user = %user, "live subscriber attached");

    let mut events = BroadcastStream::new(bus_rx);
    loop {
        tokio::select! {
            ev = events.next() => match ev {
                Some(Ok(ev)) if ev.bar == bar => {
                    if send_frame(&mut tx, &ev.msg).await.is_err() {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    // A lagged subscriber has a gap; dropping it forces a reseed.
                    warn!(bar = %bar, error = %e, "live subscriber lagged; closing");
                    break;
                }
                None => break,
            },
            frame = rx.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_request(&st, bar, &text).await,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = tx.close().await;
    info!(bar = %bar, "live subscriber detached");
}

async fn send_frame<S>(tx: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: futures_util::Sink<Message> + Unpin,
{
    let text = codec::encode_server(msg).map_err(|e| {
        warn!(kind = msg.kind(), error = %e, "live frame not encodable");
    })?;
    tx.send(Message::Text(text))
        .await
        .map_err(|_| debug!(kind = msg.kind(), "live subscriber gone"))
}

async fn handle_request(st: &HubState, bar: BarKind, text: &str) {
    let req = match codec::decode_client(text) {
        Ok(req) => req,
        Err(e) => {
            warn!(bar = %bar, error = %e, "undecodable client frame; ignoring");
            return;
        }
    };

    match req {
        ClientMessage::Subscribe { bar: other } => {
            warn!(bar = %bar, requested = %other, "already subscribed; ignoring");
        }
        ClientMessage::RequestComplete { order_id } => {
            match st.complete_order(bar, order_id).await {
                Ok(Completion::Completed(_)) => info!(bar = %bar, order_id = %order_id, "order completed"),
                Ok(Completion::Unchanged(_)) => {
                    debug!(bar = %bar, order_id = %order_id, "order already completed")
                }
                Err(e) => warn!(bar = %bar, order_id = %order_id, error = %e, "complete refused"),
            }
        }
        ClientMessage::RequestSetOpen { open } => {
            st.set_open(bar, open).await;
            info!(bar = %bar, open, "open status changed");
        }
    }
}
