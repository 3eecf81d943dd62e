//! Journey acquisition: operator credentials → session-scoped journey id.
//!
//! Every verification request carries a journey id that the portal issues in
//! exchange for operator credentials. The portal's reply is not always
//! well-formed JSON, so the reply is kept as a [`JourneyResponse`] and the id
//! is read from it on demand with a best-effort accessor that never fails.

use crate::config::Environment;
use crate::error::ValidationError;
use crate::transport::{ApiRequest, RequestBody, Transport};
use serde_json::{json, Value};
use std::fmt;
use tracing::{info, warn};

/// Path of the journey endpoint, relative to the environment base URL.
pub const JOURNEY_PATH: &str = "/api/ekyc/journeyid";

/// Operator credentials. `Debug` never prints the password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(ValidationError::EmptyCredentials);
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the journey endpoint gave back.
#[derive(Debug, Clone, PartialEq)]
pub enum JourneyResponse {
    /// HTTP 200 with a JSON body.
    Structured(Value),
    /// Non-200, or a 200 whose body is not JSON. Kept verbatim.
    Raw(String),
    /// Nothing came back; the description of what went wrong.
    TransportFailure(String),
}

impl JourneyResponse {
    /// The journey id, if one can be found.
    pub fn journey_id(&self) -> Option<String> {
        match self {
            JourneyResponse::Structured(v) => id_field(v),
            JourneyResponse::Raw(text) => extract_journey_id(text),
            JourneyResponse::TransportFailure(_) => None,
        }
    }
}

impl fmt::Display for JourneyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JourneyResponse::Structured(v) => match serde_json::to_string_pretty(v) {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "{v}"),
            },
            JourneyResponse::Raw(s) => f.write_str(s),
            JourneyResponse::TransportFailure(e) => write!(f, "Error: {e}"),
        }
    }
}

/// Best-effort read of `journeyId` from a JSON string.
///
/// Anything that is not a JSON object with a non-empty string `journeyId`
/// yields `None`.
pub fn extract_journey_id(text: &str) -> Option<String> {
    serde_json::from_str::<Value>(text)
        .ok()
        .as_ref()
        .and_then(id_field)
}

fn id_field(v: &Value) -> Option<String> {
    v.get("journeyId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Exchange credentials for a journey.
///
/// Fails only on empty credentials (before any network call). Every outcome
/// of the call itself, including transport failure, is a [`JourneyResponse`].
pub async fn acquire_journey<T: Transport>(
    transport: &T,
    environment: Environment,
    credentials: &Credentials,
) -> Result<JourneyResponse, ValidationError> {
    credentials.validate()?;

    let request = ApiRequest {
        url: environment.url(JOURNEY_PATH),
        body: RequestBody::Json(json!({
            "username": credentials.username,
            "password": credentials.password,
        })),
    };

    info!("Requesting journey id for '{}'", credentials.username);
    let response = match transport.send(request).await {
        Ok(raw) if raw.status == 200 => match serde_json::from_str::<Value>(&raw.body) {
            Ok(v) => JourneyResponse::Structured(v),
            Err(e) => {
                warn!("Journey response is not JSON: {}", e);
                JourneyResponse::Raw(raw.body)
            }
        },
        Ok(raw) => {
            warn!("Journey request failed: HTTP {}", raw.status);
            JourneyResponse::Raw(raw.body)
        }
        Err(e) => {
            warn!("Journey request failed: {}", e);
            JourneyResponse::TransportFailure(e.to_string())
        }
    };

    Ok(response)
}
