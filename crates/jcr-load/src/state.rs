//! Page load state machine.
//!
//! ```text
//! Pending --ok--> Ready(data)
//! Pending --err-> Failed(status?)
//! Ready / Failed --reload--> Pending
//! ```
//!
//! All transitions are pure. Resolutions are applied in the order they
//! arrive: when two reloads race, the last one to resolve wins.

use crate::FetchError;

/// Sentinel meaning "no status recorded".
pub const STATUS_UNSET: u16 = 0;
pub const STATUS_OK: u16 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState<T> {
    Pending,
    Ready(T),
    /// `None` when the failure carried no status (network failure).
    Failed(Option<u16>),
}

impl<T> Default for LoadState<T> {
    fn default() -> Self {
        LoadState::Pending
    }
}

/// What the page must show for its current load state.
#[derive(Debug, PartialEq, Eq)]
pub enum ViewDecision<'a, T> {
    Loading,
    Redirect(u16),
    Content(&'a T),
}

/// Render rule over the legacy numeric pair `(loaded, status)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderRule {
    Loading,
    Redirect(u16),
    Content,
}

/// The render decision every page applies.
///
/// Not loaded + a status other than 200 and the unset sentinel redirects to
/// the error view for that status; not loaded otherwise shows the loading
/// indicator.
pub fn render_rule(loaded: bool, status: u16) -> RenderRule {
    if loaded {
        return RenderRule::Content;
    }
    match status {
        STATUS_OK | STATUS_UNSET => RenderRule::Loading,
        s => RenderRule::Redirect(s),
    }
}

impl<T> LoadState<T> {
    pub fn new() -> Self {
        LoadState::Pending
    }

    /// Apply one fetch resolution.
    pub fn resolve(&mut self, result: Result<T, FetchError>) {
        *self = match result {
            Ok(data) => LoadState::Ready(data),
            Err(err) => LoadState::Failed(err.status()),
        };
    }

    /// Re-enter `Pending` for a manual refresh.
    pub fn reload(&mut self) {
        *self = LoadState::Pending;
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            LoadState::Ready(d) => Some(d),
            _ => None,
        }
    }

    /// Legacy numeric status: 200 when ready, the failure status when one was
    /// recorded, otherwise the unset sentinel.
    pub fn status(&self) -> u16 {
        match self {
            LoadState::Pending => STATUS_UNSET,
            LoadState::Ready(_) => STATUS_OK,
            LoadState::Failed(s) => s.unwrap_or(STATUS_UNSET),
        }
    }

    pub fn view(&self) -> ViewDecision<'_, T> {
        match (self, render_rule(self.is_ready(), self.status())) {
            (LoadState::Ready(data), _) => ViewDecision::Content(data),
            (_, RenderRule::Redirect(s)) => ViewDecision::Redirect(s),
            _ => ViewDecision::Loading,
        }
    }
}
