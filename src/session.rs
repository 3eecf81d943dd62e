//! Operator session: everything one interactive session remembers.
//!
//! A [`Session`] is an explicit context object owned by the caller and
//! passed by reference to each stage. It holds the client configuration, the
//! cached journey response, one image + edit parameters per [`Slot`], and the
//! cached API parameter sets. Nothing here is persisted.

use crate::config::{ClientConfig, Environment};
use crate::error::{EkycError, ValidationError};
use crate::journey::JourneyResponse;
use crate::params::{FaceMatchParams, OkayDocParams, OkayIdParams, PassportParams};
use crate::pipeline::load::ImageAsset;
use crate::pipeline::transform::{self, EditParams, TransformOutput};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// A named upload position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// Front of an ID card.
    Front,
    /// Back of an ID card.
    Back,
    /// Passport data page, half size.
    Half,
    /// Passport, full spread.
    Full,
    /// ID card photo used for face matching.
    IdCard,
    /// Best selfie frame.
    Best,
    /// Non-passport document.
    Doc,
}

impl Slot {
    pub const ALL: [Slot; 7] = [
        Slot::Front,
        Slot::Back,
        Slot::Half,
        Slot::Full,
        Slot::IdCard,
        Slot::Best,
        Slot::Doc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Front => "front",
            Slot::Back => "back",
            Slot::Half => "half",
            Slot::Full => "full",
            Slot::IdCard => "idcard",
            Slot::Best => "best",
            Slot::Doc => "doc",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upload and edit state of one slot.
#[derive(Debug, Clone, Default)]
pub struct SlotState {
    pub asset: Option<ImageAsset>,
    pub params: EditParams,
}

/// The image a slot contributes to a payload.
#[derive(Debug, Clone)]
pub struct PreparedImage<'a> {
    /// The original when nothing was edited, otherwise the edited copy.
    pub image: Cow<'a, DynamicImage>,
    pub icc_profile: Option<&'a [u8]>,
    pub edited: bool,
    /// Set when the requested edit was rejected (e.g. an invalid crop box).
    pub warning: Option<ValidationError>,
}

/// One operator session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    config: ClientConfig,
    journey: Option<JourneyResponse>,
    slots: HashMap<Slot, SlotState>,
    pub okaydoc: OkayDocParams,
    pub okayid: OkayIdParams,
    pub passport: PassportParams,
    pub face_match: FaceMatchParams,
}

impl Session {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    /// Switch portal. The cached journey belongs to the old portal and is
    /// dropped.
    pub fn set_environment(&mut self, env: Environment) {
        if self.config.environment != env {
            self.config.environment = env;
            self.journey = None;
        }
    }

    // ── Journey ──────────────────────────────────────────────────────────

    /// Cache a journey response, replacing any previous one.
    pub fn set_journey(&mut self, response: JourneyResponse) {
        self.journey = Some(response);
    }

    /// Use a journey id obtained elsewhere.
    pub fn set_journey_id(&mut self, id: impl Into<String>) {
        self.journey = Some(JourneyResponse::Structured(json!({ "journeyId": id.into() })));
    }

    pub fn clear_journey(&mut self) {
        self.journey = None;
    }

    pub fn journey(&self) -> Option<&JourneyResponse> {
        self.journey.as_ref()
    }

    pub fn journey_id(&self) -> Option<String> {
        self.journey.as_ref().and_then(JourneyResponse::journey_id)
    }

    // ── Slots ────────────────────────────────────────────────────────────

    /// Put an image in `slot`, keeping the slot's edit parameters.
    pub fn upload(&mut self, slot: Slot, asset: ImageAsset) {
        debug!("Slot {}: {}x{} {}", slot, asset.width(), asset.height(), asset.mode());
        self.slots.entry(slot).or_default().asset = Some(asset);
    }

    /// Decode `bytes` and put the result in `slot`.
    pub fn upload_bytes(&mut self, slot: Slot, bytes: &[u8]) -> Result<(), EkycError> {
        let asset = ImageAsset::from_bytes(bytes)?;
        self.upload(slot, asset);
        Ok(())
    }

    pub fn remove(&mut self, slot: Slot) -> Option<ImageAsset> {
        self.slots.get_mut(&slot).and_then(|s| s.asset.take())
    }

    pub fn image(&self, slot: Slot) -> Option<&ImageAsset> {
        self.slots.get(&slot).and_then(|s| s.asset.as_ref())
    }

    pub fn edit_params(&self, slot: Slot) -> EditParams {
        self.slots.get(&slot).map(|s| s.params).unwrap_or_default()
    }

    /// Replace a slot's edit parameters after range-checking them. On error
    /// the previous parameters stay in place.
    pub fn set_edit_params(&mut self, slot: Slot, params: EditParams) -> Result<(), ValidationError> {
        params.validate()?;
        self.slots.entry(slot).or_default().params = params;
        Ok(())
    }

    /// Back to brightness 1.0, contrast 1.0, margin 0, crop off.
    pub fn reset_edits(&mut self, slot: Slot) {
        if let Some(s) = self.slots.get_mut(&slot) {
            s.params = EditParams::default();
        }
    }

    /// Forget journey, uploads, edits and cached parameters. The
    /// configuration is kept.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Edited preview of a slot, or `None` when the slot is empty.
    pub fn preview(&self, slot: Slot) -> Option<TransformOutput> {
        let state = self.slots.get(&slot)?;
        let asset = state.asset.as_ref()?;
        Some(transform::transform(&asset.image, &state.params))
    }

    /// The image a slot contributes to a submission.
    ///
    /// An unedited slot borrows its original upload instead of copying it.
    pub fn prepared(&self, slot: Slot) -> Option<PreparedImage<'_>> {
        let state = self.slots.get(&slot)?;
        let asset = state.asset.as_ref()?;
        let icc_profile = asset.icc_profile.as_deref();

        if !state.params.is_edited() {
            return Some(PreparedImage {
                image: Cow::Borrowed(&asset.image),
                icc_profile,
                edited: false,
                warning: None,
            });
        }

        let out = transform::transform(&asset.image, &state.params);
        let image = if out.edited {
            Cow::Owned(out.image)
        } else {
            Cow::Borrowed(&asset.image)
        };
        Some(PreparedImage {
            image,
            icc_profile,
            edited: out.edited,
            warning: out.warning,
        })
    }
}
