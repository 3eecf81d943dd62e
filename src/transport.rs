//! HTTP transport seam.
//!
//! Request assembly (which fields, which files) lives in
//! [`crate::pipeline::submit`]; this module only moves an [`ApiRequest`] over
//! the wire and hands back status + body text. The [`Transport`] trait is
//! the seam tests replace with a recording fake, so every precondition can
//! be checked without a network.

use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// One outgoing POST.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub url: String,
    pub body: RequestBody,
}

/// Body shape of an [`ApiRequest`].
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// `application/json`.
    Json(Value),
    /// `multipart/form-data`, parts in order.
    Multipart(Vec<FormPart>),
}

/// One multipart field.
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: &'static str,
        value: String,
    },
    /// A file streamed from `path`, which must exist until `send` returns.
    File {
        name: &'static str,
        path: PathBuf,
        file_name: String,
        mime: &'static str,
        len: u64,
    },
}

impl FormPart {
    pub fn name(&self) -> &'static str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// Status and body text as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// A response body the API may or may not have sent as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Structured(Value),
    Raw(String),
}

impl ResponseBody {
    /// JSON when `text` parses, otherwise the text itself.
    pub fn parse(text: String) -> Self {
        match serde_json::from_str::<Value>(&text) {
            Ok(v) => ResponseBody::Structured(v),
            Err(_) => ResponseBody::Raw(text),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Structured(v) => Some(v),
            ResponseBody::Raw(_) => None,
        }
    }
}

impl fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Structured(v) => match serde_json::to_string_pretty(v) {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "{v}"),
            },
            ResponseBody::Raw(s) => f.write_str(s),
        }
    }
}

/// Connection-level failure: nothing usable came back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends one request and returns the raw reply.
///
/// Implementations must not retry; a failed call is reported once.
pub trait Transport {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// [`Transport`] backed by `reqwest`, using the client's default timeouts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, crate::error::EkycError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| crate::error::EkycError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (custom proxy, TLS roots).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        info!("POST {}", request.url);

        let builder = self.client.post(&request.url);
        let builder = match request.body {
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts).await?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("Failed to read response body: {e}")))?;

        debug!("HTTP {} from {} ({} bytes)", status, request.url, body.len());
        Ok(RawResponse { status, body })
    }
}

async fn build_form(parts: Vec<FormPart>) -> Result<reqwest::multipart::Form, TransportError> {
    use reqwest::multipart::{Form, Part};

    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File {
                name,
                path,
                file_name,
                mime,
                len,
            } => {
                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    TransportError(format!("Failed to open '{}': {e}", path.display()))
                })?;
                let part = Part::stream_with_length(reqwest::Body::from(file), len)
                    .file_name(file_name)
                    .mime_str(mime)
                    .map_err(|e| TransportError(e.to_string()))?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}
