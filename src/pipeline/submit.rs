//! API submission: session slots → fixed-shape request → normalised outcome.
//!
//! Each [`Endpoint`] has one request shape. JSON endpoints embed base64
//! images; multipart endpoints upload files staged through temp files that
//! are deleted when the submission returns, whatever the outcome.
//!
//! Preconditions (journey id present, required slots filled, required
//! parameters non-empty) are all checked before any image is encoded, so a
//! rejected submission costs nothing and never touches the network.

use crate::error::{EkycError, ValidationError};
use crate::journey::{self, Credentials, JourneyResponse};
use crate::params::{OkayDocParams, OkayIdParams};
use crate::pipeline::encode::{encode, EncodedImage, StagedImage, TargetFormat};
use crate::session::{Session, Slot};
use crate::transport::{ApiRequest, FormPart, RawResponse, RequestBody, ResponseBody, Transport};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{info, warn};

pub const OKAYDOC_PATH: &str = "/api/ekyc/okaydoc";
pub const OKAYID_PATH: &str = "/api/ekyc/okayid";
pub const OKAYFACE_PATH: &str = "/api/ekyc/okayface/v1-1";
pub const OKAYLIVE_PATH: &str = "/api/ekyc/okaylive";

/// Format used for document, face and liveness images.
const DEFAULT_FORMAT: TargetFormat = TargetFormat::Jpeg;

/// The five request variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// OkayDoc, non-passport document.
    Document,
    /// OkayDoc, passport.
    Passport,
    /// OkayID, front + back of an ID card.
    IdCard,
    /// OkayFace, ID photo vs. selfie.
    FaceMatch,
    /// OkayLive, selfie liveness.
    Liveness,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Document,
        Endpoint::Passport,
        Endpoint::IdCard,
        Endpoint::FaceMatch,
        Endpoint::Liveness,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Document | Endpoint::Passport => OKAYDOC_PATH,
            Endpoint::IdCard => OKAYID_PATH,
            Endpoint::FaceMatch => OKAYFACE_PATH,
            Endpoint::Liveness => OKAYLIVE_PATH,
        }
    }

    pub fn is_multipart(self) -> bool {
        matches!(self, Endpoint::FaceMatch | Endpoint::Liveness)
    }

    /// Slots that must hold an image before submitting.
    pub fn required_slots(self) -> &'static [Slot] {
        match self {
            Endpoint::Document => &[Slot::Doc],
            Endpoint::Passport => &[Slot::Half],
            Endpoint::IdCard => &[Slot::Front, Slot::Back],
            Endpoint::FaceMatch => &[Slot::IdCard, Slot::Best],
            Endpoint::Liveness => &[Slot::Best],
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Endpoint::Document => "OkayDoc",
            Endpoint::Passport => "OkayDoc (passport)",
            Endpoint::IdCard => "OkayID",
            Endpoint::FaceMatch => "OkayFace",
            Endpoint::Liveness => "OkayLive",
        };
        f.write_str(s)
    }
}

// ── Request shapes ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OkayDocRequest<'a> {
    journey_id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    id_image_base64_image: String,
    #[serde(flatten)]
    params: &'a OkayDocParams,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PassportRequest<'a> {
    journey_id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    country: &'a str,
    half_size_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_size_image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OkayIdRequest<'a> {
    journey_id: &'a str,
    base64_image_string: String,
    back_image: String,
    #[serde(flatten)]
    params: &'a OkayIdParams,
}

// ── Submitter ────────────────────────────────────────────────────────────

/// Runs journey acquisition and submissions over a [`Transport`].
#[derive(Debug, Clone)]
pub struct Submitter<T> {
    transport: T,
}

impl<T: Transport> Submitter<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Acquire a journey and cache the response in `session`.
    ///
    /// Empty credentials leave the session untouched. Any response, even a
    /// failed one, replaces the cached response so the operator sees it.
    pub async fn acquire_journey(
        &self,
        session: &mut Session,
        credentials: &Credentials,
    ) -> Result<JourneyResponse, ValidationError> {
        let response =
            journey::acquire_journey(&self.transport, session.environment(), credentials).await?;
        session.set_journey(response.clone());
        Ok(response)
    }

    /// Encode the session's images for `endpoint` and submit them.
    ///
    /// Returns the parsed JSON body of an HTTP 200. The session is never
    /// modified.
    pub async fn submit(&self, session: &Session, endpoint: Endpoint) -> Result<Value, EkycError> {
        let journey_id = check_preconditions(session, endpoint)?;
        let url = session.environment().url(endpoint.path());

        // Staged files must outlive the request; they are removed when
        // `_staged` drops at the end of this scope, on every path.
        let (body, _staged) = if endpoint.is_multipart() {
            let (parts, staged) = build_multipart(session, endpoint, &journey_id)?;
            (RequestBody::Multipart(parts), staged)
        } else {
            (build_json(session, endpoint, &journey_id)?, Vec::new())
        };

        info!("Submitting {} request", endpoint);
        let request = ApiRequest {
            url: url.clone(),
            body,
        };
        match self.transport.send(request).await {
            Ok(raw) => normalise(endpoint, raw),
            Err(e) => {
                warn!("{} request failed: {}", endpoint, e);
                Err(EkycError::Transport {
                    url,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Synchronous wrapper around [`Submitter::submit`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from async
    /// code.
    pub fn submit_blocking(&self, session: &Session, endpoint: Endpoint) -> Result<Value, EkycError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| EkycError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.submit(session, endpoint))
    }
}

/// Journey id, required slots and required parameters, in that order.
fn check_preconditions(session: &Session, endpoint: Endpoint) -> Result<String, ValidationError> {
    let journey_id = session
        .journey_id()
        .filter(|id| !id.trim().is_empty())
        .ok_or(ValidationError::MissingJourneyId)?;

    for &slot in endpoint.required_slots() {
        if session.image(slot).is_none() {
            return Err(ValidationError::MissingImage { slot });
        }
    }

    match endpoint {
        Endpoint::Document => session.okaydoc.validate()?,
        Endpoint::Passport => session.passport.validate()?,
        _ => {}
    }

    Ok(journey_id)
}

fn encode_slot(session: &Session, slot: Slot, format: TargetFormat) -> Result<EncodedImage, EkycError> {
    let prepared = session
        .prepared(slot)
        .ok_or(ValidationError::MissingImage { slot })?;
    if let Some(ref w) = prepared.warning {
        warn!("Slot {}: {}; submitting the original image", slot, w);
    }
    let config = session.config();
    let icc = if config.preserve_icc_profile {
        prepared.icc_profile
    } else {
        None
    };
    encode(&prepared.image, &config.encode_options(format), icc)
}

fn build_json(session: &Session, endpoint: Endpoint, journey_id: &str) -> Result<RequestBody, EkycError> {
    let value = match endpoint {
        Endpoint::Document => to_value(&OkayDocRequest {
            journey_id,
            kind: "nonpassport",
            id_image_base64_image: encode_slot(session, Slot::Doc, DEFAULT_FORMAT)?.to_base64(),
            params: &session.okaydoc,
        })?,
        Endpoint::Passport => {
            let full_size_image = match session.image(Slot::Full) {
                Some(_) => Some(encode_slot(session, Slot::Full, DEFAULT_FORMAT)?.to_base64()),
                None => None,
            };
            to_value(&PassportRequest {
                journey_id,
                kind: "passport",
                country: session.passport.country.trim(),
                half_size_image: encode_slot(session, Slot::Half, DEFAULT_FORMAT)?.to_base64(),
                full_size_image,
            })?
        }
        Endpoint::IdCard => {
            let format = session.okayid.image_format;
            to_value(&OkayIdRequest {
                journey_id,
                base64_image_string: encode_slot(session, Slot::Front, format)?.to_base64(),
                back_image: encode_slot(session, Slot::Back, format)?.to_base64(),
                params: &session.okayid,
            })?
        }
        Endpoint::FaceMatch | Endpoint::Liveness => {
            return Err(EkycError::Internal(format!("{endpoint} is a multipart endpoint")));
        }
    };
    Ok(RequestBody::Json(value))
}

fn build_multipart(
    session: &Session,
    endpoint: Endpoint,
    journey_id: &str,
) -> Result<(Vec<FormPart>, Vec<StagedImage>), EkycError> {
    let mut parts = vec![FormPart::Text {
        name: "journeyId",
        value: journey_id.to_string(),
    }];
    let mut staged = Vec::new();

    let files: &[(&'static str, Slot)] = match endpoint {
        Endpoint::FaceMatch => {
            let liveness = session.face_match.liveness_detection;
            parts.push(FormPart::Text {
                name: "livenessDetection",
                value: liveness.to_string(),
            });
            &[("imageIdCard", Slot::IdCard), ("imageBest", Slot::Best)]
        }
        Endpoint::Liveness => &[("imageBest", Slot::Best)],
        _ => {
            return Err(EkycError::Internal(format!("{endpoint} is a JSON endpoint")));
        }
    };

    for &(name, slot) in files {
        let file = encode_slot(session, slot, DEFAULT_FORMAT)?.stage()?;
        parts.push(FormPart::File {
            name,
            path: file.path().to_path_buf(),
            file_name: format!("{}.{}", slot, file.format().extension()),
            mime: file.format().mime_type(),
            len: file.len(),
        });
        staged.push(file);
    }

    Ok((parts, staged))
}

fn to_value<S: Serialize>(request: &S) -> Result<Value, EkycError> {
    serde_json::to_value(request)
        .map_err(|e| EkycError::Internal(format!("Failed to serialise request: {e}")))
}

/// HTTP 200 with JSON is success; everything else is a remote error that
/// carries whatever body came back.
fn normalise(endpoint: Endpoint, raw: RawResponse) -> Result<Value, EkycError> {
    match (raw.status, ResponseBody::parse(raw.body)) {
        (200, ResponseBody::Structured(v)) => {
            info!("{} request successful", endpoint);
            Ok(v)
        }
        (status, body) => {
            warn!("{} request failed with status code: {}", endpoint, status);
            Err(EkycError::Remote { status, body })
        }
    }
}
