//! jcr-page
//!
//! Admin page composition. Every page mounts the same way:
//!
//! ```text
//! mount -> AccessGate (route -> permission) -> Loader (page data)
//!                                           -> LiveOrderChannel (live pages only)
//! unmount -> scope closed, channel closed
//! ```
//!
//! [`Portal`] holds what pages share (gate, route table, REST client, live
//! URL, timeout); each [`AdminPage`] owns its own load state and channel.

mod error;
mod page;
mod portal;

pub use error::PortalError;
pub use page::{AdminPage, PageView, LIVE_UNAVAILABLE_STATUS};
pub use portal::Portal;
