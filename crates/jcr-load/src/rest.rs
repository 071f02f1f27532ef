//! Thin REST client for page data and writes.
//!
//! Response bodies are decoded straight into caller-provided types; a shape
//! mismatch surfaces as [`FetchError::Decode`] / [`SubmitError::Decode`] at
//! this boundary rather than deep inside rendering.

use jcr_config::SessionToken;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{FetchError, SubmitError};

/// One binary image plus its form fields, sent as multipart.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    /// e.g. `image/png`
    pub mime: String,
    pub bytes: Vec<u8>,
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<SessionToken>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, token: Option<SessionToken>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<SessionToken>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.header(reqwest::header::AUTHORIZATION, t.bearer()),
            None => req,
        }
    }

    /// `GET {path}` decoded as `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let resp = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// `POST {path}` with a JSON body, response decoded as `T`.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, SubmitError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "POST");
        let req = self.authorize(self.http.post(&url)).json(body);
        send_write(req).await
    }

    /// `POST {path}` as multipart: an `image` file part plus text fields.
    pub async fn upload_image<T: DeserializeOwned>(
        &self,
        path: &str,
        upload: ImageUpload,
    ) -> Result<T, SubmitError> {
        let url = self.url(path);
        debug!(%url, file = %upload.file_name, size = upload.bytes.len(), "POST multipart");

        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime)
            .map_err(|e| SubmitError::Transport(format!("invalid mime type: {e}")))?;

        let mut form = reqwest::multipart::Form::new().part("image", part);
        for (k, v) in upload.fields {
            form = form.text(k, v);
        }

        let req = self.authorize(self.http.post(&url)).multipart(form);
        send_write(req).await
    }
}

async fn send_write<T: DeserializeOwned>(req: reqwest::RequestBuilder) -> Result<T, SubmitError> {
    let resp = req
        .send()
        .await
        .map_err(|e| SubmitError::Transport(e.to_string()))?;

    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(|e| SubmitError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(SubmitError::Rejected {
            status: status.as_u16(),
            message: error_message(&String::from_utf8_lossy(&body)),
        });
    }

    // Writes that answer with an empty body decode as JSON null.
    let body: &[u8] = if body.is_empty() { b"null" } else { &body };
    serde_json::from_slice(body).map_err(|e| SubmitError::Decode(e.to_string()))
}

/// Pull a human message out of an error body: `{"message": ..}`,
/// `{"error": ..}`, or the raw text (truncated).
fn error_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(s) = v.get(key).and_then(Value::as_str) {
                return s.to_string();
            }
        }
    }
    body.trim().chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_json_fields() {
        assert_eq!(error_message(r#"{"message":"Name taken"}"#), "Name taken");
        assert_eq!(error_message(r#"{"error":"Forbidden"}"#), "Forbidden");
        assert_eq!(error_message("  plain text  "), "plain text");
    }

    #[test]
    fn urls_join_without_double_slash() {
        let c = RestClient::new("http://jcr.local/", None);
        assert_eq!(c.url("/api/events"), "http://jcr.local/api/events");
        assert_eq!(c.url("api/events"), "http://jcr.local/api/events");
    }
}
