//! jcr-gate
//!
//! Access gate run by every admin page before any page data is requested.
//!
//! Architectural decisions:
//! - One outbound identity lookup per `verify`; nothing is cached.
//! - Absent and empty permission sets are the same thing: denied with 403.
//! - Any failure of the lookup (transport, status, decode, timeout) is a
//!   terminal denial carrying a status code; there is no automatic retry.
//! - Routes map to required permissions through one declarative table
//!   ([`RoutePermissions`]); a route missing from the table is denied
//!   without touching the network.

mod decision;
mod routes;
mod source;

use std::time::Duration;

use tracing::{debug, info, warn};

pub use decision::{decide, DenialReason, GateDecision};
pub use routes::{normalize_route, RoutePermissions};
pub use source::{HttpIdentitySource, IdentitySource, SourceError};

/// Human message shown when the identity lookup itself fails.
pub const VERIFY_FAILED_MESSAGE: &str = "Unable to verify admin status";

/// Status used for authorization failures.
pub const FORBIDDEN: u16 = 403;

/// Status used when a lookup failure carries no status of its own.
pub const DEFAULT_FAILURE_STATUS: u16 = 500;

/// Status used when the lookup does not finish within the configured timeout.
pub const TIMEOUT_STATUS: u16 = 408;

/// Permission check bound to one identity source.
pub struct AccessGate<S> {
    source: S,
    timeout: Duration,
}

impl<S: IdentitySource> AccessGate<S> {
    pub fn new(source: S, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Look up the viewer once and decide against `required`.
    pub async fn verify(&self, required: &str) -> GateDecision {
        let looked_up = tokio::time::timeout(self.timeout, self.source.verify()).await;

        let resp = match looked_up {
            Ok(Ok(resp)) => resp,
            Ok(Err(err)) => {
                let status = err.status().unwrap_or(DEFAULT_FAILURE_STATUS);
                warn!(source = self.source.name(), status, error = %err, "identity lookup failed");
                return GateDecision::Denied {
                    status,
                    reason: DenialReason::VerifyFailed,
                };
            }
            Err(_) => {
                warn!(
                    source = self.source.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "identity lookup timed out"
                );
                return GateDecision::Denied {
                    status: TIMEOUT_STATUS,
                    reason: DenialReason::VerifyFailed,
                };
            }
        };

        let decision = decide(&resp, required);
        match &decision {
            GateDecision::Granted { user } => {
                debug!(required, user = ?user.as_ref().map(|u| &u.username), "access granted")
            }
            GateDecision::Denied { status, reason } => {
                info!(required, status, reason = reason.as_str(), "access denied")
            }
        }
        decision
    }

    /// Resolve the permission for `route` and verify it.
    ///
    /// Unknown routes are denied with 403 before any lookup is made.
    pub async fn verify_route(&self, routes: &RoutePermissions, route: &str) -> GateDecision {
        match routes.required_for(route) {
            Some(required) => self.verify(required).await,
            None => {
                warn!(route, "no permission registered for route; denying");
                GateDecision::Denied {
                    status: FORBIDDEN,
                    reason: DenialReason::UnknownRoute,
                }
            }
        }
    }
}
