//! Identity lookup boundary.

use std::fmt;

use jcr_config::SessionToken;
use jcr_schemas::VerifyResponse;

/// Errors an [`IdentitySource`] may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The request never produced a response.
    Transport(String),
    /// The endpoint answered with a non-success status.
    Status { status: u16, message: String },
    /// The body did not match the expected shape.
    Decode(String),
}

impl SourceError {
    /// HTTP status carried by the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::Status { status, .. } => Some(*status),
            SourceError::Transport(_) | SourceError::Decode(_) => None,
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(msg) => write!(f, "transport error: {msg}"),
            SourceError::Status { status, message } => {
                write!(f, "identity endpoint returned status={status}: {message}")
            }
            SourceError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Where the viewer's identity and permissions come from.
///
/// Object-safe so pages can hold a `Box<dyn IdentitySource>`.
#[async_trait::async_trait]
pub trait IdentitySource: Send + Sync {
    /// Name used in log fields.
    fn name(&self) -> &'static str;

    async fn verify(&self) -> Result<VerifyResponse, SourceError>;
}

#[async_trait::async_trait]
impl<T: IdentitySource + ?Sized> IdentitySource for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn verify(&self) -> Result<VerifyResponse, SourceError> {
        (**self).verify().await
    }
}

/// Identity source backed by `GET {verify_url}` with a bearer token.
///
/// The token is never logged.
#[derive(Debug, Clone)]
pub struct HttpIdentitySource {
    http: reqwest::Client,
    url: String,
    token: Option<SessionToken>,
}

impl HttpIdentitySource {
    pub fn new(url: impl Into<String>, token: Option<SessionToken>) -> Self {
        Self::with_client(reqwest::Client::new(), url, token)
    }

    pub fn with_client(
        http: reqwest::Client,
        url: impl Into<String>,
        token: Option<SessionToken>,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            token,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl IdentitySource for HttpIdentitySource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn verify(&self) -> Result<VerifyResponse, SourceError> {
        let mut req = self.http.get(&self.url);
        if let Some(token) = &self.token {
            req = req.header(reqwest::header::AUTHORIZATION, token.bearer());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect::<String>();
            return Err(SourceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<VerifyResponse>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}
