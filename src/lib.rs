//! # ekyc-pipeline
//!
//! Edit identity-document and face images and submit them to an eKYC
//! verification portal (OkayDoc, OkayID, OkayFace, OkayLive).
//!
//! ## Pipeline Overview
//!
//! ```text
//! credentials ─▶ journey id (once per session)
//!
//! upload
//!  │
//!  ├─ 1. Load       decode bytes, keep ICC profile
//!  ├─ 2. Transform  brightness → contrast → crop | margin
//!  ├─ 3. Encode     JPEG/PNG → base64 (JSON) or temp file (multipart)
//!  └─ 4. Submit     fixed-shape request → JSON body or typed error
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ekyc_pipeline::{Credentials, Endpoint, HttpTransport, Session, Slot, Submitter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let submitter = Submitter::new(HttpTransport::new()?);
//!     let mut session = Session::default();
//!
//!     submitter
//!         .acquire_journey(&mut session, &Credentials::new("operator", "secret"))
//!         .await?;
//!
//!     session.upload_bytes(Slot::Best, &std::fs::read("selfie.jpg")?)?;
//!     let body = submitter.submit(&session, Endpoint::Liveness).await?;
//!     println!("{body:#}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ekyc` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod journey;
pub mod params;
pub mod pipeline;
pub mod session;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, Environment};
pub use error::{EkycError, ValidationError};
pub use journey::{acquire_journey, extract_journey_id, Credentials, JourneyResponse};
pub use params::{FaceMatchParams, OkayDocParams, OkayIdParams, PassportParams};
pub use pipeline::encode::{encode, EncodeOptions, EncodedImage, StagedImage, TargetFormat};
pub use pipeline::load::{ImageAsset, PixelMode};
pub use pipeline::submit::{Endpoint, Submitter};
pub use pipeline::transform::{transform, CropBox, EditParams, TransformOutput};
pub use session::{PreparedImage, Session, Slot};
pub use transport::{
    ApiRequest, FormPart, HttpTransport, RawResponse, RequestBody, ResponseBody, Transport,
    TransportError,
};
