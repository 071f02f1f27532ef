//! Live order channel frames.
//!
//! Frames are JSON text messages, internally tagged on `"type"`:
//!
//! ```json
//! {"type":"subscribe","bar":"toastie"}
//! {"type":"initial_snapshot","open":true,"orders":[ ... ]}
//! {"type":"new_order","order":{ ... }}
//! {"type":"order_completed","order_id":7,"completed_at":"2026-10-19T12:00:00Z"}
//! {"type":"open_status_changed","open":false}
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Order identifier, unique within one hub session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which live ordering subsystem a channel is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarKind {
    Toastie,
    Drinks,
}

impl BarKind {
    pub const ALL: [BarKind; 2] = [BarKind::Toastie, BarKind::Drinks];

    pub fn as_str(&self) -> &'static str {
        match self {
            BarKind::Toastie => "toastie",
            BarKind::Drinks => "drinks",
        }
    }

    /// Permission that grants the bar's admin pages and its live board.
    pub fn manage_permission(&self) -> &'static str {
        match self {
            BarKind::Toastie => "toastie.manage",
            BarKind::Drinks => "bar.manage",
        }
    }
}

impl fmt::Display for BarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBarKind(pub String);

impl fmt::Display for UnknownBarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown bar '{}'. expected one of: toastie | drinks",
            self.0
        )
    }
}

impl std::error::Error for UnknownBarKind {}

impl FromStr for BarKind {
    type Err = UnknownBarKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "toastie" | "toastie-bar" => Ok(BarKind::Toastie),
            "drinks" | "bar" => Ok(BarKind::Drinks),
            other => Err(UnknownBarKind(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// LiveOrder
// ---------------------------------------------------------------------------

/// An order as mirrored by the live channel.
///
/// `payload` is the order contents; the channel never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveOrder {
    pub id: OrderId,
    pub placed_at: DateTime<Utc>,
    /// `None` while the order is outstanding. Set once, never cleared.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payload: Value,
}

impl LiveOrder {
    pub fn is_outstanding(&self) -> bool {
        self.completed_at.is_none()
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Hub -> client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent exactly once per subscription, before any other frame.
    InitialSnapshot { open: bool, orders: Vec<LiveOrder> },
    NewOrder { order: LiveOrder },
    OrderCompleted {
        order_id: OrderId,
        completed_at: DateTime<Utc>,
    },
    OpenStatusChanged { open: bool },
}

impl ServerMessage {
    /// Short event name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::InitialSnapshot { .. } => "initial_snapshot",
            ServerMessage::NewOrder { .. } => "new_order",
            ServerMessage::OrderCompleted { .. } => "order_completed",
            ServerMessage::OpenStatusChanged { .. } => "open_status_changed",
        }
    }
}

/// Client -> hub frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first frame after connecting.
    Subscribe { bar: BarKind },
    RequestComplete { order_id: OrderId },
    RequestSetOpen { open: bool },
}
