use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use jcr_config::{PortalConfig, SessionToken};
use jcr_gate::{AccessGate, HttpIdentitySource, IdentitySource, RoutePermissions};
use jcr_live::{ConnectOptions, LiveOrderChannel, OrderNotifier};
use jcr_load::{FetchError, Loader, PageScope, RestClient, ViewDecision};
use jcr_schemas::BarKind;
use tracing::{info, warn};

use crate::page::{log_mount, AdminPage, LiveSlot};

/// What every page of one portal session shares.
pub struct Portal<S> {
    gate: AccessGate<S>,
    routes: RoutePermissions,
    rest: RestClient,
    live_url: String,
    timeout: Duration,
    /// Presented on the live channel upgrade.
    session: Option<SessionToken>,
}

impl Portal<HttpIdentitySource> {
    pub fn from_config(cfg: &PortalConfig, token: Option<SessionToken>) -> Self {
        let source = HttpIdentitySource::new(cfg.verify_url(), token.clone());
        Self::new(
            AccessGate::new(source, cfg.request_timeout),
            RoutePermissions::with_overrides(cfg.routes.iter()),
            RestClient::new(cfg.base_url.clone(), token.clone()),
            cfg.live_url(),
            cfg.request_timeout,
        )
        .with_session_token(token)
    }
}

impl<S: IdentitySource> Portal<S> {
    pub fn new(
        gate: AccessGate<S>,
        routes: RoutePermissions,
        rest: RestClient,
        live_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            gate,
            routes,
            rest,
            live_url: live_url.into(),
            timeout,
            session: None,
        }
    }

    pub fn with_session_token(mut self, token: Option<SessionToken>) -> Self {
        self.session = token;
        self
    }

    pub fn routes(&self) -> &RoutePermissions {
        &self.routes
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn live_url(&self) -> &str {
        &self.live_url
    }

    /// Gate `route`, then fetch page data with `fetch`. Nothing is fetched
    /// for a denied page.
    pub async fn mount<T, F, Fut>(&self, route: &str, fetch: F) -> AdminPage<T>
    where
        T: Clone + Send + Sync,
        F: FnOnce(RestClient) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let page = self.gate_page(route).await;
        if page.decision.is_granted() {
            page.loader.load(fetch(self.rest.clone())).await;
        }
        page
    }

    /// As [`Portal::mount`], and additionally open the live channel for
    /// `bar` once the gate has granted. The data fetch and the channel
    /// handshake run concurrently, each bounded by the request timeout.
    ///
    /// A load that ends on the error view closes the channel again.
    pub async fn mount_live<T, F, Fut>(
        &self,
        route: &str,
        bar: BarKind,
        notifier: Arc<dyn OrderNotifier>,
        fetch: F,
    ) -> AdminPage<T>
    where
        T: Clone + Send + Sync,
        F: FnOnce(RestClient) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut page = self.gate_page(route).await;
        if !page.decision.is_granted() {
            return page;
        }

        let opts = ConnectOptions {
            bearer: self.session.as_ref().map(|t| t.expose().to_string()),
            timeout: self.timeout,
        };
        let (_, opened) = tokio::join!(
            page.loader.load(fetch(self.rest.clone())),
            LiveOrderChannel::open_with(&self.live_url, bar, notifier, &opts),
        );
        page.live = Some(match opened {
            Ok(mut ch) => {
                let redirected = page
                    .loader
                    .with_state(|st| matches!(st.view(), ViewDecision::Redirect(_)))
                    .await;
                if redirected {
                    info!(route, bar = %bar, "page data failed; releasing live channel");
                    ch.close().await;
                }
                LiveSlot::Open(ch)
            }
            Err(e) => {
                warn!(route, bar = %bar, error = %e, "live channel unavailable");
                LiveSlot::Failed(e)
            }
        });
        page
    }

    async fn gate_page<T: Clone + Send + Sync>(&self, route: &str) -> AdminPage<T> {
        let scope = PageScope::new();
        let guard = scope.guard();
        let decision = self.gate.verify_route(&self.routes, route).await;
        log_mount(route, &decision);
        AdminPage {
            route: route.to_string(),
            decision,
            loader: Loader::new(scope, self.timeout),
            rest: self.rest.clone(),
            live: None,
            guard: Some(guard),
        }
    }
}
