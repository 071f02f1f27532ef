//! Form submission flow.
//!
//! ```text
//! Editing --submit (valid)--> Submitting --ok--> Submitted
//!                                        --err-> Editing + blocking Notice
//! Editing --submit (invalid)--> Editing   (no network call)
//! Submitting --future dropped--> Editing  (no notice)
//! ```

use std::fmt;
use std::future::Future;

use tracing::{info, warn};

use crate::SubmitError;

/// Local precondition failure. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Forms check their own preconditions before anything is sent.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPhase {
    Editing,
    Submitting,
    Submitted,
}

/// Blocking, dismissable alert raised by a remote rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitFailure {
    Validation(ValidationError),
    Remote(SubmitError),
    /// A submission is already in flight or has already succeeded.
    NotEditable(SubmitPhase),
}

impl fmt::Display for SubmitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitFailure::Validation(e) => write!(f, "validation failed: {e}"),
            SubmitFailure::Remote(e) => write!(f, "{e}"),
            SubmitFailure::NotEditable(p) => write!(f, "form is not editable (phase={p:?})"),
        }
    }
}

impl std::error::Error for SubmitFailure {}

/// A form plus where it is in the submit flow.
#[derive(Debug, Clone)]
pub struct Submission<F> {
    form: F,
    phase: SubmitPhase,
    notice: Option<Notice>,
}

impl<F: Validate> Submission<F> {
    pub fn new(form: F) -> Self {
        Self {
            form,
            phase: SubmitPhase::Editing,
            notice: None,
        }
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    /// Mutable access while editing; `None` once submitting or submitted.
    pub fn form_mut(&mut self) -> Option<&mut F> {
        match self.phase {
            SubmitPhase::Editing => Some(&mut self.form),
            _ => None,
        }
    }

    pub fn phase(&self) -> SubmitPhase {
        self.phase
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Validate, then send.
    ///
    /// `send` receives the form and must return a future that owns what it
    /// needs; it is only called once validation passes.
    pub async fn submit<T, S, Fut>(&mut self, send: S) -> Result<T, SubmitFailure>
    where
        S: FnOnce(&F) -> Fut,
        Fut: Future<Output = Result<T, SubmitError>>,
    {
        if self.phase != SubmitPhase::Editing {
            return Err(SubmitFailure::NotEditable(self.phase));
        }
        if let Err(e) = self.form.validate() {
            info!(field = %e.field, "submit blocked by validation");
            return Err(SubmitFailure::Validation(e));
        }

        self.notice = None;
        let in_flight = InFlight::start(&mut self.phase);
        let fut = send(&self.form);

        match fut.await {
            Ok(v) => {
                in_flight.settle(SubmitPhase::Submitted);
                Ok(v)
            }
            Err(e) => {
                warn!(error = %e, "submit rejected");
                in_flight.settle(SubmitPhase::Editing);
                self.notice = Some(Notice {
                    title: "Submission failed".to_string(),
                    message: e.user_message(),
                });
                Err(SubmitFailure::Remote(e))
            }
        }
    }
}

/// Holds the phase at `Submitting` while the send is awaited. If the
/// submit future is dropped first, the form goes back to `Editing`.
struct InFlight<'a> {
    phase: &'a mut SubmitPhase,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn start(phase: &'a mut SubmitPhase) -> Self {
        *phase = SubmitPhase::Submitting;
        Self {
            phase,
            settled: false,
        }
    }

    fn settle(mut self, to: SubmitPhase) {
        *self.phase = to;
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            info!("submit cancelled; form editable again");
            *self.phase = SubmitPhase::Editing;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct CareersPost {
        title: String,
    }

    impl Validate for CareersPost {
        fn validate(&self) -> Result<(), ValidationError> {
            if self.title.trim().is_empty() {
                return Err(ValidationError::new("title", "Title is required"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn invalid_form_never_calls_send() {
        let mut sub = Submission::new(CareersPost {
            title: " ".into(),
        });
        let mut called = false;
        let r: Result<(), _> = sub
            .submit(|_| {
                called = true;
                async { Ok(()) }
            })
            .await;
        assert!(matches!(r, Err(SubmitFailure::Validation(_))));
        assert!(!called);
        assert_eq!(sub.phase(), SubmitPhase::Editing);
    }

    #[tokio::test]
    async fn cancelled_submit_returns_to_editing() {
        let mut sub = Submission::new(CareersPost {
            title: "Intern".into(),
        });
        let r = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            sub.submit(|_| std::future::pending::<Result<(), SubmitError>>()),
        )
        .await;
        assert!(r.is_err());
        assert_eq!(sub.phase(), SubmitPhase::Editing);
        assert!(sub.notice().is_none());
        assert!(sub.form_mut().is_some());
    }

    #[tokio::test]
    async fn rejection_returns_to_editing_with_notice() {
        let mut sub = Submission::new(CareersPost {
            title: "Intern".into(),
        });
        let r: Result<(), _> = sub
            .submit(|_| async {
                Err(SubmitError::Rejected {
                    status: 400,
                    message: "Deadline must be in the future".into(),
                })
            })
            .await;
        assert!(matches!(r, Err(SubmitFailure::Remote(_))));
        assert_eq!(sub.phase(), SubmitPhase::Editing);
        assert_eq!(
            sub.notice().unwrap().message,
            "Deadline must be in the future"
        );
        assert!(sub.form_mut().is_some());

        sub.dismiss_notice();
        assert!(sub.notice().is_none());
    }

    #[tokio::test]
    async fn success_is_terminal() {
        let mut sub = Submission::new(CareersPost {
            title: "Intern".into(),
        });
        let id: u32 = sub.submit(|_| async { Ok(42) }).await.unwrap();
        assert_eq!(id, 42);
        assert_eq!(sub.phase(), SubmitPhase::Submitted);
        assert!(sub.form_mut().is_none());

        let again: Result<u32, _> = sub.submit(|_| async { Ok(1) }).await;
        assert_eq!(
            again.unwrap_err(),
            SubmitFailure::NotEditable(SubmitPhase::Submitted)
        );
    }
}
