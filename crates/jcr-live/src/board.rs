//! Local mirror of one bar's live orders.
//!
//! # Invariants
//!
//! - **Server is authoritative**: confirmed state only changes on hub frames.
//!   Optimistic changes (pending completion, pending open flag) are tracked
//!   separately and reconciled by the matching confirmation frame.
//!
//! - **Completion is monotonic**: a completion timestamp is set once. A
//!   replayed `order_completed` with the same timestamp is a no-op; one with
//!   a different timestamp keeps the first and reports an inconsistency.
//!
//! - **Nothing before the snapshot**: frames arriving before
//!   `initial_snapshot` are buffered and replayed, in order, right after it.
//!
//! - **Unknown completions are parked, not dropped**: `order_completed` for an
//!   id the mirror has never seen leaves the visible orders unchanged and is
//!   applied if a `new_order` for that id arrives later.
//!
//! All logic is pure: no IO, no clock, no logging. The channel logs outcomes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use jcr_schemas::{BarKind, LiveOrder, OrderId, ServerMessage};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A frame that refers to state the mirror disagrees with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelInconsistency {
    /// Completion for an id never seen via `new_order` (parked).
    UnknownOrder {
        order_id: OrderId,
        completed_at: DateTime<Utc>,
    },
    /// Completion replayed with a different timestamp (first one kept).
    CompletionConflict {
        order_id: OrderId,
        kept: DateTime<Utc>,
        received: DateTime<Utc>,
    },
    /// `new_order` for an id already in the mirror.
    DuplicateOrder { order_id: OrderId },
}

impl ChannelInconsistency {
    pub fn order_id(&self) -> OrderId {
        match self {
            ChannelInconsistency::UnknownOrder { order_id, .. }
            | ChannelInconsistency::CompletionConflict { order_id, .. }
            | ChannelInconsistency::DuplicateOrder { order_id } => *order_id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelInconsistency::UnknownOrder { .. } => "unknown_order",
            ChannelInconsistency::CompletionConflict { .. } => "completion_conflict",
            ChannelInconsistency::DuplicateOrder { .. } => "duplicate_order",
        }
    }
}

/// What applying one frame did to the mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Mirror seeded (`reseeded` = a snapshot had already been applied).
    Seeded { orders: usize, reseeded: bool },
    /// New order inserted. The audible notification fires once per this outcome.
    OrderAdded(LiveOrder),
    OrderCompleted {
        order_id: OrderId,
        completed_at: DateTime<Utc>,
    },
    /// Replay of a completion already applied with the same timestamp.
    AlreadyCompleted(OrderId),
    OpenChanged(bool),
    /// Frame held until the snapshot arrives.
    Buffered(&'static str),
    Inconsistent(ChannelInconsistency),
}

// ---------------------------------------------------------------------------
// LiveBoard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LiveBoard {
    bar: BarKind,
    seeded: bool,
    open: bool,
    pending_open: Option<bool>,
    orders: BTreeMap<OrderId, LiveOrder>,
    pending_completions: BTreeSet<OrderId>,
    parked_completions: BTreeMap<OrderId, DateTime<Utc>>,
    early: Vec<ServerMessage>,
}

impl LiveBoard {
    pub fn new(bar: BarKind) -> Self {
        Self {
            bar,
            seeded: false,
            open: false,
            pending_open: None,
            orders: BTreeMap::new(),
            pending_completions: BTreeSet::new(),
            parked_completions: BTreeMap::new(),
            early: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Inbound frames
    // -----------------------------------------------------------------------

    /// Apply one hub frame, in delivery order.
    pub fn apply(&mut self, msg: ServerMessage) -> Vec<Applied> {
        match msg {
            ServerMessage::InitialSnapshot { open, orders } => self.seed(open, orders),
            other if !self.seeded => {
                let kind = other.kind();
                self.early.push(other);
                vec![Applied::Buffered(kind)]
            }
            other => vec![self.apply_live(other)],
        }
    }

    fn seed(&mut self, open: bool, orders: Vec<LiveOrder>) -> Vec<Applied> {
        let reseeded = self.seeded;
        self.seeded = true;
        self.open = open;
        self.pending_open = None;
        self.orders = orders.into_iter().map(|o| (o.id, o)).collect();
        self.pending_completions
            .retain(|id| self.orders.get(id).is_some_and(LiveOrder::is_outstanding));

        // Parked completions whose order arrived with the snapshot.
        let parked: Vec<(OrderId, DateTime<Utc>)> = self
            .parked_completions
            .iter()
            .filter(|(id, _)| self.orders.contains_key(*id))
            .map(|(id, t)| (*id, *t))
            .collect();
        for (id, t) in parked {
            self.parked_completions.remove(&id);
            if let Some(o) = self.orders.get_mut(&id) {
                o.completed_at.get_or_insert(t);
            }
        }

        let mut out = vec![Applied::Seeded {
            orders: self.orders.len(),
            reseeded,
        }];
        for msg in std::mem::take(&mut self.early) {
            out.push(self.apply_live(msg));
        }
        out
    }

    fn apply_live(&mut self, msg: ServerMessage) -> Applied {
        match msg {
            ServerMessage::InitialSnapshot { .. } => {
                // Only reachable from the early buffer, which never holds snapshots.
                Applied::Buffered("initial_snapshot")
            }
            ServerMessage::NewOrder { order } => self.add_order(order),
            ServerMessage::OrderCompleted {
                order_id,
                completed_at,
            } => self.complete(order_id, completed_at),
            ServerMessage::OpenStatusChanged { open } => {
                self.open = open;
                self.pending_open = None;
                Applied::OpenChanged(open)
            }
        }
    }

    fn add_order(&mut self, mut order: LiveOrder) -> Applied {
        if let Some(existing) = self.orders.get_mut(&order.id) {
            // Keep completion monotonic; take the hub's payload.
            order.completed_at = existing.completed_at.or(order.completed_at);
            let id = order.id;
            *existing = order;
            return Applied::Inconsistent(ChannelInconsistency::DuplicateOrder { order_id: id });
        }

        if let Some(t) = self.parked_completions.remove(&order.id) {
            order.completed_at.get_or_insert(t);
        }
        self.orders.insert(order.id, order.clone());
        Applied::OrderAdded(order)
    }

    fn complete(&mut self, order_id: OrderId, completed_at: DateTime<Utc>) -> Applied {
        let Some(order) = self.orders.get_mut(&order_id) else {
            self.parked_completions.entry(order_id).or_insert(completed_at);
            return Applied::Inconsistent(ChannelInconsistency::UnknownOrder {
                order_id,
                completed_at,
            });
        };

        self.pending_completions.remove(&order_id);
        match order.completed_at {
            None => {
                order.completed_at = Some(completed_at);
                Applied::OrderCompleted {
                    order_id,
                    completed_at,
                }
            }
            Some(kept) if kept == completed_at => Applied::AlreadyCompleted(order_id),
            Some(kept) => Applied::Inconsistent(ChannelInconsistency::CompletionConflict {
                order_id,
                kept,
                received: completed_at,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Optimistic local changes
    // -----------------------------------------------------------------------

    /// Mark an outstanding order as completing, ahead of the hub's confirmation.
    ///
    /// Returns `false` when the order is unknown or already completed.
    pub fn mark_completing(&mut self, order_id: OrderId) -> bool {
        match self.orders.get(&order_id) {
            Some(o) if o.is_outstanding() => {
                self.pending_completions.insert(order_id);
                true
            }
            _ => false,
        }
    }

    /// Show `open` immediately; the next `open_status_changed` replaces it.
    pub fn set_open_optimistic(&mut self, open: bool) {
        self.pending_open = Some(open);
    }

    /// Roll back an optimistic completion whose request never left.
    pub fn cancel_completing(&mut self, order_id: OrderId) {
        self.pending_completions.remove(&order_id);
    }

    /// Roll back an optimistic open flag whose request never left.
    pub fn clear_pending_open(&mut self) {
        self.pending_open = None;
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn bar(&self) -> BarKind {
        self.bar
    }

    /// `false` until `initial_snapshot` has been applied.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Open flag as displayed: the pending optimistic value if any, else confirmed.
    pub fn is_open(&self) -> bool {
        self.pending_open.unwrap_or(self.open)
    }

    /// Last open flag confirmed by the hub.
    pub fn confirmed_open(&self) -> bool {
        self.open
    }

    pub fn has_pending_open(&self) -> bool {
        self.pending_open.is_some()
    }

    pub fn order(&self, id: OrderId) -> Option<&LiveOrder> {
        self.orders.get(&id)
    }

    /// All mirrored orders, by id.
    pub fn orders(&self) -> impl Iterator<Item = &LiveOrder> {
        self.orders.values()
    }

    /// Orders without a confirmed completion, oldest placement first.
    pub fn outstanding(&self) -> Vec<&LiveOrder> {
        let mut v: Vec<&LiveOrder> = self.orders.values().filter(|o| o.is_outstanding()).collect();
        v.sort_by_key(|o| (o.placed_at, o.id));
        v
    }

    pub fn outstanding_count(&self) -> usize {
        self.orders.values().filter(|o| o.is_outstanding()).count()
    }

    /// Completion requested locally but not yet confirmed by the hub.
    pub fn is_completing(&self, id: OrderId) -> bool {
        self.pending_completions.contains(&id)
    }

    pub fn awaiting_confirmation(&self) -> usize {
        self.pending_completions.len()
    }

    pub fn parked_count(&self) -> usize {
        self.parked_completions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t(sec: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_790_000_000 + sec, 0).unwrap()
    }

    fn order(id: u64, placed: i64) -> LiveOrder {
        LiveOrder {
            id: OrderId(id),
            placed_at: t(placed),
            completed_at: None,
            payload: json!({ "items": ["cheese toastie"] }),
        }
    }

    fn seeded(orders: Vec<LiveOrder>) -> LiveBoard {
        let mut b = LiveBoard::new(BarKind::Toastie);
        b.apply(ServerMessage::InitialSnapshot { open: true, orders });
        b
    }

    #[test]
    fn waits_for_snapshot() {
        let mut b = LiveBoard::new(BarKind::Toastie);
        assert!(!b.is_seeded());
        let out = b.apply(ServerMessage::NewOrder { order: order(1, 0) });
        assert_eq!(out, vec![Applied::Buffered("new_order")]);
        assert_eq!(b.outstanding_count(), 0);
    }

    #[test]
    fn early_frames_replay_after_snapshot() {
        let mut b = LiveBoard::new(BarKind::Toastie);
        b.apply(ServerMessage::NewOrder { order: order(3, 5) });
        b.apply(ServerMessage::OpenStatusChanged { open: false });

        let out = b.apply(ServerMessage::InitialSnapshot {
            open: true,
            orders: vec![order(1, 0), order(2, 1)],
        });

        assert_eq!(
            out[0],
            Applied::Seeded {
                orders: 2,
                reseeded: false
            }
        );
        assert!(matches!(out[1], Applied::OrderAdded(ref o) if o.id == OrderId(3)));
        assert_eq!(out[2], Applied::OpenChanged(false));
        assert_eq!(b.outstanding_count(), 3);
        assert!(!b.is_open());
    }

    #[test]
    fn new_then_completed_is_not_outstanding() {
        let mut b = seeded(vec![]);
        let out = b.apply(ServerMessage::NewOrder { order: order(7, 0) });
        assert!(matches!(out[0], Applied::OrderAdded(_)));
        assert_eq!(b.outstanding_count(), 1);

        b.apply(ServerMessage::OrderCompleted {
            order_id: OrderId(7),
            completed_at: t(60),
        });
        assert_eq!(b.order(OrderId(7)).unwrap().completed_at, Some(t(60)));
        assert_eq!(b.outstanding_count(), 0);
    }

    #[test]
    fn repeated_completion_is_idempotent() {
        let mut b = seeded(vec![order(7, 0)]);
        let msg = ServerMessage::OrderCompleted {
            order_id: OrderId(7),
            completed_at: t(60),
        };
        b.apply(msg.clone());
        let once = b.order(OrderId(7)).cloned();
        let out = b.apply(msg);
        assert_eq!(out, vec![Applied::AlreadyCompleted(OrderId(7))]);
        assert_eq!(b.order(OrderId(7)).cloned(), once);
    }

    #[test]
    fn completion_replay_with_other_timestamp_keeps_first() {
        let mut b = seeded(vec![order(7, 0)]);
        b.apply(ServerMessage::OrderCompleted {
            order_id: OrderId(7),
            completed_at: t(60),
        });
        let out = b.apply(ServerMessage::OrderCompleted {
            order_id: OrderId(7),
            completed_at: t(90),
        });
        assert_eq!(
            out,
            vec![Applied::Inconsistent(
                ChannelInconsistency::CompletionConflict {
                    order_id: OrderId(7),
                    kept: t(60),
                    received: t(90),
                }
            )]
        );
        assert_eq!(b.order(OrderId(7)).unwrap().completed_at, Some(t(60)));
    }

    #[test]
    fn unknown_completion_leaves_mirror_unchanged() {
        let mut b = seeded(vec![order(1, 0)]);
        let before: Vec<LiveOrder> = b.orders().cloned().collect();

        let out = b.apply(ServerMessage::OrderCompleted {
            order_id: OrderId(99),
            completed_at: t(10),
        });

        assert!(matches!(
            out[0],
            Applied::Inconsistent(ChannelInconsistency::UnknownOrder { order_id: OrderId(99), .. })
        ));
        let after: Vec<LiveOrder> = b.orders().cloned().collect();
        assert_eq!(before, after);
        assert_eq!(b.parked_count(), 1);
    }

    #[test]
    fn parked_completion_applies_to_late_new_order() {
        let mut b = seeded(vec![]);
        b.apply(ServerMessage::OrderCompleted {
            order_id: OrderId(5),
            completed_at: t(30),
        });
        let out = b.apply(ServerMessage::NewOrder { order: order(5, 0) });

        assert!(matches!(out[0], Applied::OrderAdded(ref o) if o.completed_at == Some(t(30))));
        assert_eq!(b.outstanding_count(), 0);
        assert_eq!(b.parked_count(), 0);
    }

    #[test]
    fn duplicate_new_order_does_not_uncomplete() {
        let mut b = seeded(vec![order(2, 0)]);
        b.apply(ServerMessage::OrderCompleted {
            order_id: OrderId(2),
            completed_at: t(5),
        });
        let out = b.apply(ServerMessage::NewOrder { order: order(2, 0) });
        assert_eq!(
            out,
            vec![Applied::Inconsistent(ChannelInconsistency::DuplicateOrder {
                order_id: OrderId(2)
            })]
        );
        assert_eq!(b.order(OrderId(2)).unwrap().completed_at, Some(t(5)));
    }

    #[test]
    fn optimistic_completion_reconciles_on_confirmation() {
        let mut b = seeded(vec![order(4, 0)]);
        assert!(b.mark_completing(OrderId(4)));
        assert!(b.is_completing(OrderId(4)));
        assert_eq!(b.outstanding_count(), 1);

        b.apply(ServerMessage::OrderCompleted {
            order_id: OrderId(4),
            completed_at: t(9),
        });
        assert!(!b.is_completing(OrderId(4)));
        assert_eq!(b.awaiting_confirmation(), 0);
        assert_eq!(b.outstanding_count(), 0);
    }

    #[test]
    fn cannot_mark_unknown_or_completed_order() {
        let mut b = seeded(vec![order(4, 0)]);
        assert!(!b.mark_completing(OrderId(8)));
        b.apply(ServerMessage::OrderCompleted {
            order_id: OrderId(4),
            completed_at: t(9),
        });
        assert!(!b.mark_completing(OrderId(4)));
    }

    #[test]
    fn open_flag_round_trip() {
        let mut b = seeded(vec![]);
        b.apply(ServerMessage::OpenStatusChanged { open: false });
        b.set_open_optimistic(true);
        assert!(b.is_open());
        assert!(!b.confirmed_open());

        b.apply(ServerMessage::OpenStatusChanged { open: true });
        assert!(b.is_open());
        assert!(!b.has_pending_open());
    }

    #[test]
    fn open_flag_converges_to_last_broadcast() {
        let mut b = seeded(vec![]);
        // This client asks to open; another client closes concurrently.
        b.set_open_optimistic(true);
        b.apply(ServerMessage::OpenStatusChanged { open: true });
        b.apply(ServerMessage::OpenStatusChanged { open: false });
        assert!(!b.is_open());

        // Optimistic value never outlives a later broadcast.
        b.set_open_optimistic(true);
        b.apply(ServerMessage::OpenStatusChanged { open: false });
        assert!(!b.is_open());
    }

    #[test]
    fn rollback_restores_confirmed_view() {
        let mut b = seeded(vec![order(4, 0)]);
        b.mark_completing(OrderId(4));
        b.set_open_optimistic(false);
        b.cancel_completing(OrderId(4));
        b.clear_pending_open();
        assert!(!b.is_completing(OrderId(4)));
        assert!(b.is_open());
    }

    #[test]
    fn outstanding_sorted_by_placement() {
        let b = seeded(vec![order(3, 20), order(1, 30), order(2, 10)]);
        let ids: Vec<u64> = b.outstanding().iter().map(|o| o.id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn second_snapshot_reseeds() {
        let mut b = seeded(vec![order(1, 0)]);
        let out = b.apply(ServerMessage::InitialSnapshot {
            open: false,
            orders: vec![order(2, 0)],
        });
        assert_eq!(
            out,
            vec![Applied::Seeded {
                orders: 1,
                reseeded: true
            }]
        );
        assert!(b.order(OrderId(1)).is_none());
        assert!(!b.is_open());
    }
}
