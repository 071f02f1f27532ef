//! jcr-live
//!
//! Live order channel: a WebSocket subscription that mirrors one bar's
//! outstanding orders and open flag.
//!
//! - [`LiveBoard`] is the pure mirror reducer (no IO).
//! - [`LiveOrderChannel`] owns the connection, applies frames to the board in
//!   delivery order, and sends completion / open-flag requests.
//!
//! Open the channel only after the access gate has granted; close it on
//! unmount. Dropping the channel also stops frame processing.

mod board;
mod channel;
pub mod codec;

pub use board::{Applied, ChannelInconsistency, LiveBoard};
pub use channel::{
    BoardUpdate, ChannelError, ConnectOptions, LiveOrderChannel, OrderNotifier, SilentNotifier,
};
