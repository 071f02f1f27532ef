//! jcr-load
//!
//! One-shot remote fetch state for admin pages, plus the REST client and the
//! form submission flow that run after the access gate has granted.
//!
//! - [`LoadState`] is the pure state machine and the single render rule.
//! - [`Loader`] drives it: bounded by a timeout, guarded by a [`PageScope`]
//!   so a fetch resolving after unmount never touches the torn-down page.
//! - [`RestClient`] is the thin JSON/multipart client.
//! - [`Submission`] gates writes behind local validation.

mod error;
mod loader;
mod rest;
mod state;
mod submit;

pub use error::{FetchError, SubmitError};
pub use loader::{Loader, PageScope, ScopeGuard};
pub use rest::{ImageUpload, RestClient};
pub use state::{render_rule, LoadState, RenderRule, ViewDecision, STATUS_OK, STATUS_UNSET};
pub use submit::{Notice, Submission, SubmitFailure, SubmitPhase, Validate, ValidationError};
