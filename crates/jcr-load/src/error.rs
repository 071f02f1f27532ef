use std::fmt;

/// Failure of a page data fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// No response at all (connection refused, reset, DNS).
    Transport(String),
    /// The endpoint answered with a non-success status.
    Status { status: u16, message: String },
    /// The body did not match the expected schema.
    Decode(String),
    /// The fetch did not finish within the page timeout.
    Timeout,
}

impl FetchError {
    /// Status recorded on the load state.
    ///
    /// Transport failures carry none; the view keeps showing the loading
    /// indicator for them. Decode failures fail closed as 500.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Transport(_) => None,
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Decode(_) => Some(500),
            FetchError::Timeout => Some(408),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "transport error: {msg}"),
            FetchError::Status { status, message } => {
                write!(f, "fetch failed status={status}: {message}")
            }
            FetchError::Decode(msg) => write!(f, "response shape mismatch: {msg}"),
            FetchError::Timeout => f.write_str("fetch timed out"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Remote rejection of a create/update action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    Transport(String),
    Rejected { status: u16, message: String },
    Decode(String),
}

impl SubmitError {
    /// Text for the blocking notice shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Transport(_) => "Could not reach the server. Please try again.".to_string(),
            SubmitError::Rejected { message, .. } if !message.is_empty() => message.clone(),
            SubmitError::Rejected { status, .. } => format!("The server rejected the request ({status})"),
            SubmitError::Decode(_) => "The server sent an unexpected response".to_string(),
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Transport(msg) => write!(f, "transport error: {msg}"),
            SubmitError::Rejected { status, message } => {
                write!(f, "submit rejected status={status}: {message}")
            }
            SubmitError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for SubmitError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failure_has_no_status() {
        assert_eq!(FetchError::Transport("refused".into()).status(), None);
    }

    #[test]
    fn decode_failure_fails_closed() {
        assert_eq!(FetchError::Decode("missing field".into()).status(), Some(500));
    }

    #[test]
    fn rejected_message_prefers_server_text() {
        let e = SubmitError::Rejected {
            status: 409,
            message: "Event is full".into(),
        };
        assert_eq!(e.user_message(), "Event is full");

        let e = SubmitError::Rejected {
            status: 409,
            message: String::new(),
        };
        assert!(e.user_message().contains("409"));
    }
}
