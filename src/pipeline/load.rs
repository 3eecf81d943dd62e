//! Upload decoding: raw bytes or a local path → [`ImageAsset`].
//!
//! The embedded ICC colour profile is captured here, at load time, because
//! `DynamicImage` does not carry it. The encoder later re-attaches it
//! verbatim or drops it explicitly.

use crate::error::EkycError;
use image::{ColorType, DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Channel layout of a raster, in the vocabulary operators know from
/// image editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelMode {
    /// Greyscale.
    L,
    /// Greyscale + alpha.
    La,
    /// Three-channel colour.
    Rgb,
    /// Colour + alpha.
    Rgba,
}

impl PixelMode {
    /// Map an `image` colour type; wide (16-bit, float) types fold into
    /// their 8-bit layout.
    pub fn of(color: ColorType) -> Self {
        match color {
            ColorType::L8 | ColorType::L16 => PixelMode::L,
            ColorType::La8 | ColorType::La16 => PixelMode::La,
            ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => PixelMode::Rgb,
            _ => PixelMode::Rgba,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, PixelMode::La | PixelMode::Rgba)
    }
}

impl fmt::Display for PixelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PixelMode::L => "L",
            PixelMode::La => "LA",
            PixelMode::Rgb => "RGB",
            PixelMode::Rgba => "RGBA",
        };
        f.write_str(s)
    }
}

/// A decoded upload bound to one slot.
#[derive(Clone)]
pub struct ImageAsset {
    pub image: DynamicImage,
    /// Raw ICC profile bytes found in the upload, if any.
    pub icc_profile: Option<Vec<u8>>,
    /// Container format the upload was decoded from.
    pub source_format: Option<ImageFormat>,
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("mode", &self.mode())
            .field("icc_profile", &self.icc_profile.as_ref().map(Vec::len))
            .field("source_format", &self.source_format)
            .finish()
    }
}

impl ImageAsset {
    /// Wrap an in-memory raster that has no colour profile.
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            icc_profile: None,
            source_format: None,
        }
    }

    /// Decode an upload, sniffing the container from its magic bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EkycError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| EkycError::io("Failed to read image header", e))?;
        let source_format = reader.format();

        let mut decoder = reader.into_decoder()?;
        let icc_profile = match decoder.icc_profile() {
            Ok(profile) => profile,
            Err(e) => {
                debug!("Ignoring unreadable ICC profile: {}", e);
                None
            }
        };
        let image = DynamicImage::from_decoder(decoder)?;

        debug!(
            "Decoded {:?} upload → {}x{} {}{}",
            source_format,
            image.width(),
            image.height(),
            PixelMode::of(image.color()),
            if icc_profile.is_some() { " (ICC)" } else { "" }
        );

        Ok(Self {
            image,
            icc_profile,
            source_format,
        })
    }

    /// Read and decode an image file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EkycError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| EkycError::io(format!("Failed to read '{}'", path.display()), e))?;
        Self::from_bytes(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn mode(&self) -> PixelMode {
        PixelMode::of(self.image.color())
    }
}
