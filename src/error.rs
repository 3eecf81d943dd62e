//! Error types for the ekyc-pipeline library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ValidationError`]: **Local**, the operator's input is incomplete or
//!   out of range (no journey id, a required image slot is empty, a crop box
//!   falls outside the image). Raised before any network call is made, so
//!   the operator can fix the input and retry immediately.
//!
//! * [`EkycError`]: **any failure of a submit action**, a validation error,
//!   a transport failure, a non-200 reply from the remote API, or an image
//!   that could not be encoded.
//!
//! No variant is fatal to the process. Every failure leaves the
//! [`crate::session::Session`] exactly as it was.

use crate::session::Slot;
use crate::transport::ResponseBody;
use thiserror::Error;

/// Input the operator must correct before anything is sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Username or password was empty.
    #[error("Please enter both username and password.")]
    EmptyCredentials,

    /// No journey id has been acquired (or it could not be extracted).
    #[error("No journey id available.\nAcquire one first with `ekyc journey` or pass --journey-id.")]
    MissingJourneyId,

    /// A slot required by the selected endpoint holds no image.
    #[error("Missing required image: {slot}")]
    MissingImage { slot: Slot },

    /// A required request parameter is empty.
    #[error("Missing required parameter '{field}'")]
    MissingField { field: &'static str },

    /// The crop box does not fit inside the image.
    #[error(
        "Invalid crop box ({left}, {top}, {right}, {bottom}) for a {width}x{height} image; \
         need 0 <= left < right <= width and 0 <= top < bottom <= height"
    )]
    InvalidCrop {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
        width: u32,
        height: u32,
    },

    /// An edit parameter is outside its accepted range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// All errors returned by the ekyc-pipeline library.
#[derive(Debug, Error)]
pub enum EkycError {
    /// Local precondition failed; no request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Connection refused, DNS failure, timeout, TLS error.
    #[error("Request to '{url}' failed: {reason}\nCheck your internet connection.")]
    Transport { url: String, reason: String },

    /// The API answered with a non-success status (or an unreadable 200).
    #[error("API request failed with status code: {status}")]
    Remote { status: u16, body: ResponseBody },

    /// Decoding an upload or encoding a payload image failed.
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// Reading an upload or staging a temp file failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EkycError {
    /// True when the failure happened locally, before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, EkycError::Validation(_))
    }

    /// HTTP status of a remote failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            EkycError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        EkycError::Io {
            context: context.into(),
            source,
        }
    }
}
