//! One mounted admin page.

use std::future::Future;

use jcr_gate::GateDecision;
use jcr_live::{ChannelError, LiveBoard, LiveOrderChannel};
use jcr_load::{
    FetchError, LoadState, Loader, RestClient, ScopeGuard, SubmitError, Submission, Validate,
    ViewDecision,
};
use tracing::{debug, info};

use crate::PortalError;

/// Error view status for a live page whose channel could not be opened.
pub const LIVE_UNAVAILABLE_STATUS: u16 = 503;

/// What the page shows right now.
#[derive(Debug, Clone, PartialEq)]
pub enum PageView<T> {
    /// Gate or page data still outstanding (or failed without a status).
    Loading,
    /// Page data is ready but the live snapshot has not arrived yet.
    WaitingForLive,
    Redirect(u16),
    /// `board` is set on live pages only.
    Content { data: T, board: Option<LiveBoard> },
}

pub(crate) enum LiveSlot {
    Open(LiveOrderChannel),
    Failed(ChannelError),
}

/// State owned by one page between mount and unmount.
///
/// Dropping the page has the same effect as [`AdminPage::unmount`] minus the
/// close frame: the load scope closes and the channel stops applying frames.
pub struct AdminPage<T> {
    pub(crate) route: String,
    pub(crate) decision: GateDecision,
    pub(crate) loader: Loader<T>,
    pub(crate) rest: RestClient,
    pub(crate) live: Option<LiveSlot>,
    pub(crate) guard: Option<ScopeGuard>,
}

impl<T: Clone + Send + Sync> AdminPage<T> {
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn decision(&self) -> &GateDecision {
        &self.decision
    }

    pub fn loader(&self) -> &Loader<T> {
        &self.loader
    }

    /// The live channel, if this is a live page and it connected. Already
    /// closed when the page data load ended on the error view.
    pub fn live(&self) -> Option<&LiveOrderChannel> {
        match &self.live {
            Some(LiveSlot::Open(ch)) => Some(ch),
            _ => None,
        }
    }

    pub fn live_error(&self) -> Option<&ChannelError> {
        match &self.live {
            Some(LiveSlot::Failed(e)) => Some(e),
            _ => None,
        }
    }

    pub async fn view(&self) -> PageView<T> {
        match &self.decision {
            GateDecision::Granted { .. } => {}
            denied => {
                return match denied.redirect_status() {
                    Some(s) => PageView::Redirect(s),
                    None => PageView::Loading,
                }
            }
        }
        if let Some(LiveSlot::Failed(_)) = &self.live {
            return PageView::Redirect(LIVE_UNAVAILABLE_STATUS);
        }

        let data = self
            .loader
            .with_state(|st| match st.view() {
                ViewDecision::Loading => Err(PageView::Loading),
                ViewDecision::Redirect(s) => Err(PageView::Redirect(s)),
                ViewDecision::Content(d) => Ok(d.clone()),
            })
            .await;
        let data = match data {
            Ok(d) => d,
            Err(view) => return view,
        };

        match &self.live {
            Some(LiveSlot::Open(ch)) => {
                let board = ch.board().await;
                if board.is_seeded() {
                    PageView::Content {
                        data,
                        board: Some(board),
                    }
                } else {
                    PageView::WaitingForLive
                }
            }
            _ => PageView::Content { data, board: None },
        }
    }

    /// The redirect-class failure the page is in, if any.
    pub async fn failure(&self) -> Option<PortalError> {
        if let GateDecision::Denied { status, reason } = &self.decision {
            return Some(PortalError::AuthDenied {
                status: *status,
                reason: *reason,
            });
        }
        match self.loader.snapshot().await {
            LoadState::Failed(status) => Some(PortalError::LoadFailed { status }),
            _ => None,
        }
    }

    /// Manual refresh. Denied pages stay denied; returns `false` then, and
    /// when the page unmounted before the fetch resolved.
    pub async fn reload<F, Fut>(&self, fetch: F) -> bool
    where
        F: FnOnce(RestClient) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        if !self.decision.is_granted() {
            return false;
        }
        self.loader.reload(fetch(self.rest.clone())).await
    }

    /// Run a form submission through this page's REST client.
    pub async fn submit<Form, R, S, Fut>(
        &self,
        submission: &mut Submission<Form>,
        send: S,
    ) -> Result<R, PortalError>
    where
        Form: Validate,
        S: FnOnce(RestClient, &Form) -> Fut,
        Fut: Future<Output = Result<R, SubmitError>>,
    {
        if let GateDecision::Denied { status, reason } = &self.decision {
            return Err(PortalError::AuthDenied {
                status: *status,
                reason: *reason,
            });
        }
        let rest = self.rest.clone();
        submission
            .submit(move |form| send(rest, form))
            .await
            .map_err(PortalError::from)
    }

    /// Close the load scope and the live channel.
    pub async fn unmount(mut self) {
        drop(self.guard.take());
        if let Some(LiveSlot::Open(ch)) = self.live.as_mut() {
            ch.close().await;
        }
        debug!(route = %self.route, "page unmounted");
    }
}

pub(crate) fn log_mount(route: &str, decision: &GateDecision) {
    match decision {
        GateDecision::Granted { user } => {
            info!(route, user = ?user.as_ref().map(|u| &u.username), "page mounted")
        }
        GateDecision::Denied { status, reason } => {
            info!(route, status, reason = reason.as_str(), "page mount denied")
        }
    }
}
