use std::fmt;

use jcr_gate::DenialReason;
use jcr_live::ChannelInconsistency;
use jcr_load::{SubmitError, SubmitFailure, SubmitPhase};

/// Everything a page can surface to the viewer.
///
/// | variant                | surfaced as                         |
/// |------------------------|-------------------------------------|
/// | `AuthDenied`           | redirect to error view for `status` |
/// | `LoadFailed`           | redirect (or endless loading when no status) |
/// | `SubmitFailed`         | blocking, dismissable notice        |
/// | `ValidationFailed`     | inline; never reaches the network   |
/// | `ChannelInconsistency` | logged only; mirror unchanged       |
#[derive(Debug, Clone, PartialEq)]
pub enum PortalError {
    AuthDenied { status: u16, reason: DenialReason },
    LoadFailed { status: Option<u16> },
    SubmitFailed { status: Option<u16>, message: String },
    ValidationFailed { field: String, message: String },
    ChannelInconsistency(ChannelInconsistency),
}

impl PortalError {
    /// Status of the error view this failure sends the viewer to.
    pub fn redirect_status(&self) -> Option<u16> {
        match self {
            PortalError::AuthDenied { status, .. } => Some(*status),
            PortalError::LoadFailed { status } => *status,
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PortalError::AuthDenied { .. } => "auth_denied",
            PortalError::LoadFailed { .. } => "load_failed",
            PortalError::SubmitFailed { .. } => "submit_failed",
            PortalError::ValidationFailed { .. } => "validation_failed",
            PortalError::ChannelInconsistency(_) => "channel_inconsistency",
        }
    }
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortalError::AuthDenied { status, reason } => {
                write!(f, "{} (status={status})", reason.message())
            }
            PortalError::LoadFailed { status: Some(s) } => write!(f, "page data failed to load (status={s})"),
            PortalError::LoadFailed { status: None } => f.write_str("page data failed to load"),
            PortalError::SubmitFailed { message, .. } => f.write_str(message),
            PortalError::ValidationFailed { field, message } => write!(f, "{field}: {message}"),
            PortalError::ChannelInconsistency(inc) => {
                write!(f, "live channel inconsistency {} for order {}", inc.as_str(), inc.order_id())
            }
        }
    }
}

impl std::error::Error for PortalError {}

impl From<SubmitFailure> for PortalError {
    fn from(f: SubmitFailure) -> Self {
        match f {
            SubmitFailure::Validation(e) => PortalError::ValidationFailed {
                field: e.field,
                message: e.message,
            },
            SubmitFailure::Remote(e) => PortalError::SubmitFailed {
                status: match &e {
                    SubmitError::Rejected { status, .. } => Some(*status),
                    _ => None,
                },
                message: e.user_message(),
            },
            SubmitFailure::NotEditable(phase) => PortalError::SubmitFailed {
                status: None,
                message: match phase {
                    SubmitPhase::Submitting => "A submission is already in progress".to_string(),
                    _ => "This form has already been submitted".to_string(),
                },
            },
        }
    }
}

impl From<ChannelInconsistency> for PortalError {
    fn from(inc: ChannelInconsistency) -> Self {
        PortalError::ChannelInconsistency(inc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jcr_load::ValidationError;
    use jcr_schemas::OrderId;

    #[test]
    fn only_auth_and_load_failures_redirect() {
        let denied = PortalError::AuthDenied {
            status: 403,
            reason: DenialReason::MissingPermission,
        };
        assert_eq!(denied.redirect_status(), Some(403));
        assert_eq!(PortalError::LoadFailed { status: Some(500) }.redirect_status(), Some(500));
        assert_eq!(PortalError::LoadFailed { status: None }.redirect_status(), None);

        let inc: PortalError = ChannelInconsistency::DuplicateOrder {
            order_id: OrderId(3),
        }
        .into();
        assert_eq!(inc.redirect_status(), None);
        assert_eq!(inc.kind(), "channel_inconsistency");
    }

    #[test]
    fn submit_failures_map_into_taxonomy() {
        let v: PortalError = SubmitFailure::Validation(ValidationError::new("title", "Title is required")).into();
        assert_eq!(
            v,
            PortalError::ValidationFailed {
                field: "title".into(),
                message: "Title is required".into()
            }
        );

        let r: PortalError = SubmitFailure::Remote(SubmitError::Rejected {
            status: 409,
            message: "Event already exists".into(),
        })
        .into();
        assert_eq!(r.to_string(), "Event already exists");
        assert!(matches!(r, PortalError::SubmitFailed { status: Some(409), .. }));
    }
}
