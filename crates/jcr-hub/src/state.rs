//! Shared runtime state for jcr-hub.
//!
//! Handlers receive `State<Arc<HubState>>` from Axum.
//!
//! # Invariants
//!
//! - Every mutation broadcasts its frame while still holding the bars write
//!   lock, and [`HubState::subscribe`] takes the snapshot under the read lock
//!   after subscribing to the bus. A subscriber therefore sees each change
//!   exactly once: either inside its snapshot or as a later frame.
//! - A completion timestamp is set once. Repeat completion requests change
//!   nothing and broadcast nothing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use jcr_schemas::{BarKind, LiveOrder, OrderId, ServerMessage, UserIdentity, VerifyResponse};
use tokio::sync::{broadcast, RwLock};

const BUS_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// HubEvent - live bus payload
// ---------------------------------------------------------------------------

/// One frame for every subscriber of `bar`.
#[derive(Clone, Debug)]
pub struct HubEvent {
    pub bar: BarKind,
    pub msg: ServerMessage,
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    UnknownOrder { bar: BarKind, order_id: OrderId },
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::UnknownOrder { bar, order_id } => {
                write!(f, "order {order_id} not found on {bar}")
            }
        }
    }
}

impl std::error::Error for HubError {}

/// Result of a completion request.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Completed(LiveOrder),
    /// Already completed earlier; nothing changed.
    Unchanged(LiveOrder),
}

// ---------------------------------------------------------------------------
// BarState
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct BarState {
    pub open: bool,
    pub orders: BTreeMap<OrderId, LiveOrder>,
}

impl BarState {
    /// Outstanding orders, oldest first.
    pub fn outstanding(&self) -> Vec<LiveOrder> {
        let mut out: Vec<LiveOrder> = self
            .orders
            .values()
            .filter(|o| o.is_outstanding())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.placed_at.cmp(&b.placed_at).then(a.id.cmp(&b.id)));
        out
    }
}

// ---------------------------------------------------------------------------
// HubState
// ---------------------------------------------------------------------------

pub struct HubState {
    /// Live frames for all bars; sessions filter by bar.
    pub bus: broadcast::Sender<HubEvent>,
    pub build: BuildInfo,
    bars: RwLock<BTreeMap<BarKind, BarState>>,
    /// Bearer token -> identity endpoint body.
    tokens: BTreeMap<String, VerifyResponse>,
    next_id: AtomicU64,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl HubState {
    /// Bars start closed and empty.
    pub fn new(tokens: BTreeMap<String, VerifyResponse>) -> Self {
        let (bus, _rx) = broadcast::channel::<HubEvent>(BUS_CAPACITY);
        let bars = BarKind::ALL
            .iter()
            .map(|b| (*b, BarState::default()))
            .collect();
        Self {
            bus,
            build: BuildInfo {
                service: "jcr-hub",
                version: env!("CARGO_PKG_VERSION"),
            },
            bars: RwLock::new(bars),
            tokens,
            next_id: AtomicU64::new(1),
        }
    }

    /// Identity for a bearer token, `None` when the token is unknown.
    pub fn identity(&self, token: &str) -> Option<&VerifyResponse> {
        self.tokens.get(token)
    }

    /// Insert a new outstanding order and broadcast `new_order`.
    pub async fn place_order(&self, bar: BarKind, payload: serde_json::Value) -> LiveOrder {
        let mut bars = self.bars.write().await;
        // Ids are allocated under the lock so they rise in broadcast order.
        let order = LiveOrder {
            id: OrderId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            placed_at: Utc::now(),
            completed_at: None,
            payload,
        };
        bars.entry(bar)
            .or_default()
            .orders
            .insert(order.id, order.clone());
        let _ = self.bus.send(HubEvent {
            bar,
            msg: ServerMessage::NewOrder {
                order: order.clone(),
            },
        });
        order
    }

    /// Complete `order_id` once and broadcast `order_completed`.
    pub async fn complete_order(
        &self,
        bar: BarKind,
        order_id: OrderId,
    ) -> Result<Completion, HubError> {
        let mut bars = self.bars.write().await;
        let order = bars
            .get_mut(&bar)
            .and_then(|b| b.orders.get_mut(&order_id))
            .ok_or(HubError::UnknownOrder { bar, order_id })?;

        if order.completed_at.is_some() {
            return Ok(Completion::Unchanged(order.clone()));
        }
        let completed_at = Utc::now();
        order.completed_at = Some(completed_at);
        let done = order.clone();
        let _ = self.bus.send(HubEvent {
            bar,
            msg: ServerMessage::OrderCompleted {
                order_id,
                completed_at,
            },
        });
        Ok(Completion::Completed(done))
    }

    /// Set the open flag and broadcast `open_status_changed`.
    pub async fn set_open(&self, bar: BarKind, open: bool) {
        let mut bars = self.bars.write().await;
        bars.entry(bar).or_default().open = open;
        let _ = self.bus.send(HubEvent {
            bar,
            msg: ServerMessage::OpenStatusChanged { open },
        });
    }

    /// Subscribe to the bus and build the `initial_snapshot` for `bar`.
    pub async fn subscribe(&self, bar: BarKind) -> (ServerMessage, broadcast::Receiver<HubEvent>) {
        let bars = self.bars.read().await;
        let rx = self.bus.subscribe();
        let snapshot = match bars.get(&bar) {
            Some(b) => ServerMessage::InitialSnapshot {
                open: b.open,
                orders: b.outstanding(),
            },
            None => ServerMessage::InitialSnapshot {
                open: false,
                orders: Vec::new(),
            },
        };
        (snapshot, rx)
    }

    pub async fn bar(&self, bar: BarKind) -> BarState {
        self.bars.read().await.get(&bar).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Token table
// ---------------------------------------------------------------------------

/// Parse `JCR_HUB_TOKENS`-style entries:
/// `user:token=perm1,perm2;other:token2=perm3`.
///
/// An entry with nothing after `=` grants an identity with no permissions.
pub fn parse_token_table(table: &str) -> Result<BTreeMap<String, VerifyResponse>, String> {
    let mut out = BTreeMap::new();
    for entry in table.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (who, perms) = entry
            .split_once('=')
            .ok_or_else(|| format!("token entry '{entry}' is missing '='"))?;
        let (username, token) = who
            .split_once(':')
            .ok_or_else(|| format!("token entry '{entry}' must be user:token=perms"))?;
        let (username, token) = (username.trim(), token.trim());
        if username.is_empty() || token.is_empty() {
            return Err(format!("token entry '{entry}' has an empty user or token"));
        }
        let permissions = perms
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        out.insert(
            token.to_string(),
            VerifyResponse {
                user: Some(UserIdentity {
                    username: username.to_string(),
                    display_name: None,
                }),
                permissions: Some(permissions),
            },
        );
    }
    Ok(out)
}
