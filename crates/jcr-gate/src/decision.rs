use jcr_schemas::{UserIdentity, VerifyResponse};

use crate::{FORBIDDEN, VERIFY_FAILED_MESSAGE};

/// Why a viewer was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The identity lookup failed or timed out.
    VerifyFailed,
    /// The lookup succeeded but carried no permissions (absent or empty).
    NoPermissions,
    /// Permissions were present but the required one was not among them.
    MissingPermission,
    /// The route has no entry in the permission table.
    UnknownRoute,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::VerifyFailed => "verify_failed",
            DenialReason::NoPermissions => "no_permissions",
            DenialReason::MissingPermission => "missing_permission",
            DenialReason::UnknownRoute => "unknown_route",
        }
    }

    /// Message shown to the viewer.
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::VerifyFailed => VERIFY_FAILED_MESSAGE,
            DenialReason::NoPermissions
            | DenialReason::MissingPermission
            | DenialReason::UnknownRoute => "You do not have permission to view this page",
        }
    }
}

/// Outcome of one access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Granted { user: Option<UserIdentity> },
    Denied { status: u16, reason: DenialReason },
}

impl GateDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, GateDecision::Granted { .. })
    }

    /// Status of the error view the viewer must be sent to, if any.
    ///
    /// Every denial redirects; 200 and the unset sentinel 0 never do.
    pub fn redirect_status(&self) -> Option<u16> {
        match self {
            GateDecision::Granted { .. } => None,
            GateDecision::Denied { status, .. } => match *status {
                0 | 200 => None,
                s => Some(s),
            },
        }
    }
}

/// Pure decision over a successful lookup.
///
/// Granted iff the permission set is non-empty and contains `required`.
pub fn decide(resp: &VerifyResponse, required: &str) -> GateDecision {
    let permissions = resp.permissions();
    if permissions.is_empty() {
        return GateDecision::Denied {
            status: FORBIDDEN,
            reason: DenialReason::NoPermissions,
        };
    }
    if !permissions.iter().any(|p| p == required) {
        return GateDecision::Denied {
            status: FORBIDDEN,
            reason: DenialReason::MissingPermission,
        };
    }
    GateDecision::Granted {
        user: resp.user.clone(),
    }
}
