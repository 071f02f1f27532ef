//! jcr-schemas
//!
//! Wire types shared by the portal core: the identity verification payload,
//! live orders, and the frames exchanged over the live order channel.
//! No behaviour lives here beyond small accessors.

mod identity;
mod live;

pub use identity::{UserIdentity, VerifyResponse};
pub use live::{BarKind, ClientMessage, LiveOrder, OrderId, ServerMessage, UnknownBarKind};
