//! Image encoding: `DynamicImage` → JPEG/PNG bytes → base64 or temp file.
//!
//! The JSON endpoints embed images as base64 strings; the multipart
//! endpoints upload them as file parts. Both sinks are derived from the same
//! [`EncodedImage`] so a payload never encodes an image twice.
//!
//! JPEG cannot carry alpha, so alpha-bearing and wide (16-bit / float)
//! rasters are flattened to 8-bit RGB before a JPEG encode. PNG keeps alpha.

use crate::error::EkycError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, DynamicImage, ImageEncoder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Container format of an encoded payload image.
///
/// Serialises as the `imageFormat` strings the API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetFormat {
    #[default]
    #[serde(rename = "JPG")]
    Jpeg,
    #[serde(rename = "PNG")]
    Png,
}

impl TargetFormat {
    /// Name used in API request fields.
    pub fn api_name(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "JPG",
            TargetFormat::Png => "PNG",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpg",
            TargetFormat::Png => "png",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Encoder settings for one payload image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub format: TargetFormat,
    /// JPEG quality, 1–100. Ignored for PNG.
    pub jpeg_quality: u8,
    /// Best PNG compression with adaptive filtering. Ignored for JPEG.
    pub optimize: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            format: TargetFormat::Jpeg,
            jpeg_quality: 85,
            optimize: false,
        }
    }
}

impl EncodeOptions {
    pub fn png() -> Self {
        Self {
            format: TargetFormat::Png,
            ..Self::default()
        }
    }
}

/// Encoded image bytes, ready for either sink.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: TargetFormat,
}

impl EncodedImage {
    /// Standard-alphabet, padded base64 for a JSON field.
    pub fn to_base64(&self) -> String {
        let b64 = STANDARD.encode(&self.bytes);
        debug!("Encoded image → {} bytes base64", b64.len());
        b64
    }

    /// Write the bytes to a fresh temp file for a multipart upload.
    ///
    /// The file is deleted when the returned [`StagedImage`] is dropped.
    pub fn stage(&self) -> Result<StagedImage, EkycError> {
        let mut file = tempfile::Builder::new()
            .prefix("ekyc-")
            .suffix(&format!(".{}", self.format.extension()))
            .tempfile()
            .map_err(|e| EkycError::io("Failed to create temp file", e))?;
        file.write_all(&self.bytes)
            .and_then(|_| file.flush())
            .map_err(|e| EkycError::io("Failed to write temp file", e))?;
        debug!("Staged {} bytes at {}", self.bytes.len(), file.path().display());
        Ok(StagedImage {
            file,
            format: self.format,
            len: self.bytes.len() as u64,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An encoded image on disk, owned by exactly one submission.
#[derive(Debug)]
pub struct StagedImage {
    file: NamedTempFile,
    format: TargetFormat,
    len: u64,
}

impl StagedImage {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Encode `image` as `options.format`.
///
/// `icc_profile` is re-attached when given; an encoder that rejects it
/// drops it and the encode still succeeds.
pub fn encode(
    image: &DynamicImage,
    options: &EncodeOptions,
    icc_profile: Option<&[u8]>,
) -> Result<EncodedImage, EkycError> {
    let prepared = prepare_for(image, options.format);
    let (w, h) = (prepared.width(), prepared.height());
    let color = prepared.color();

    // A greyscale profile is meaningless on an RGB raster and vice versa.
    let icc_profile = match icc_profile {
        Some(_) if is_grey(image.color()) != is_grey(color) => {
            debug!("Dropping ICC profile: {:?} → {:?} changes colour space", image.color(), color);
            None
        }
        other => other,
    };
    let mut buf = Vec::new();

    match options.format {
        TargetFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, options.jpeg_quality);
            attach_icc(&mut encoder, icc_profile);
            encoder.write_image(prepared.as_bytes(), w, h, color.into())?;
        }
        TargetFormat::Png => {
            let mut encoder = if options.optimize {
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive)
            } else {
                PngEncoder::new(&mut buf)
            };
            attach_icc(&mut encoder, icc_profile);
            encoder.write_image(prepared.as_bytes(), w, h, color.into())?;
        }
    }

    debug!(
        "Encoded {}x{} {:?} as {} → {} bytes",
        w,
        h,
        color,
        options.format,
        buf.len()
    );

    Ok(EncodedImage {
        bytes: buf,
        format: options.format,
    })
}

fn attach_icc<E: ImageEncoder>(encoder: &mut E, icc_profile: Option<&[u8]>) {
    if let Some(profile) = icc_profile {
        if let Err(e) = encoder.set_icc_profile(profile.to_vec()) {
            debug!("Dropping ICC profile: {}", e);
        }
    }
}

fn is_grey(color: ColorType) -> bool {
    matches!(
        color,
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16
    )
}

/// Convert to a colour type the target encoder accepts.
fn prepare_for(image: &DynamicImage, format: TargetFormat) -> Cow<'_, DynamicImage> {
    let color = image.color();
    match format {
        TargetFormat::Jpeg => match color {
            ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(image),
            ColorType::L16 => Cow::Owned(DynamicImage::ImageLuma8(image.to_luma8())),
            _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
        },
        TargetFormat::Png => match color {
            ColorType::Rgb32F => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
            ColorType::Rgba32F => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
            _ => Cow::Borrowed(image),
        },
    }
}
