//! Per-document-type API request parameters.
//!
//! Each set is entered once, cached in the [`crate::session::Session`], and
//! copied into every request of that type. Defaults are the portal's usual
//! settings for a Malaysian MyKad.

use crate::error::ValidationError;
use crate::pipeline::encode::TargetFormat;
use serde::{Deserialize, Serialize};

/// OkayDoc (non-passport) checks.
///
/// The check flags travel as the strings `"true"` / `"false"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkayDocParams {
    pub doc_type: String,
    pub version: String,
    #[serde(with = "flag")]
    pub landmark_check: bool,
    #[serde(with = "flag")]
    pub font_check: bool,
    #[serde(with = "flag")]
    pub microprint_check: bool,
    #[serde(with = "flag")]
    pub photo_substitution_check: bool,
    #[serde(with = "flag")]
    pub ic_type_check: bool,
    #[serde(with = "flag")]
    pub color_mode: bool,
    #[serde(with = "flag")]
    pub hologram: bool,
    #[serde(with = "flag")]
    pub screen_detection: bool,
    #[serde(with = "flag")]
    pub ghost_photo_color_detection: bool,
    #[serde(with = "flag")]
    pub id_blur_detection: bool,
    #[serde(with = "flag")]
    pub islam_field_tampering_detection: bool,
    #[serde(with = "flag")]
    pub quality_check_detection: bool,
}

impl Default for OkayDocParams {
    fn default() -> Self {
        Self {
            doc_type: "mykad".to_string(),
            version: "7".to_string(),
            landmark_check: true,
            font_check: true,
            microprint_check: true,
            photo_substitution_check: true,
            ic_type_check: true,
            color_mode: true,
            hologram: true,
            screen_detection: true,
            ghost_photo_color_detection: true,
            id_blur_detection: true,
            islam_field_tampering_detection: true,
            quality_check_detection: true,
        }
    }
}

impl OkayDocParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.doc_type.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "docType" });
        }
        if self.version.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "version" });
        }
        Ok(())
    }

    /// Set every check flag at once.
    pub fn with_all_checks(mut self, on: bool) -> Self {
        self.landmark_check = on;
        self.font_check = on;
        self.microprint_check = on;
        self.photo_substitution_check = on;
        self.ic_type_check = on;
        self.color_mode = on;
        self.hologram = on;
        self.screen_detection = on;
        self.ghost_photo_color_detection = on;
        self.id_blur_detection = on;
        self.islam_field_tampering_detection = on;
        self.quality_check_detection = on;
        self
    }
}

/// OkayID (front + back ID card) options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkayIdParams {
    /// Encoding of both card images; also sent as `imageFormat`.
    pub image_format: TargetFormat,
    pub image_enabled: bool,
    pub face_image_enabled: bool,
    pub cambodia: bool,
}

impl Default for OkayIdParams {
    fn default() -> Self {
        Self {
            image_format: TargetFormat::Jpeg,
            image_enabled: true,
            face_image_enabled: true,
            cambodia: false,
        }
    }
}

/// OkayDoc passport options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportParams {
    /// Issuing country code, e.g. `"MYS"`.
    pub country: String,
}

impl PassportParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.country.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "country" });
        }
        Ok(())
    }
}

/// OkayFace options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceMatchParams {
    pub liveness_detection: bool,
}

/// `bool` ⇄ `"true"` / `"false"`.
pub(crate) mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(if *v { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let s = String::deserialize(d)?;
        match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected \"true\" or \"false\", got {other:?}"
            ))),
        }
    }
}
