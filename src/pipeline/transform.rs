//! Image edits: brightness → contrast → crop *or* margin expand.
//!
//! Brightness and contrast are per-channel point operations, so they are
//! fused into a single 256-entry lookup table and applied in one pass.
//! Alpha is never touched. The geometric step is either a crop to an
//! operator-selected box or a solid black border; the two are mutually
//! exclusive, and a selected crop box always wins.
//!
//! The caller's image is borrowed, never mutated: every output is a fresh
//! buffer.

use crate::error::ValidationError;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Upper bound of the brightness and contrast factors.
pub const MAX_FACTOR: f32 = 3.0;

/// Upper bound of the margin, in pixels.
pub const MAX_MARGIN: u32 = 300;

/// Widest preview the interactive cropper is shown at.
pub const MAX_DISPLAY_WIDTH: u32 = 400;

const MIDPOINT: f32 = 128.0;

/// Rectangle in original-image pixel coordinates; `right`/`bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBox {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Map a box drawn on a down-scaled preview back to the full-resolution
    /// image. `scale` is `original_width / display_width`
    /// (see [`display_scale`]).
    pub fn from_display(left: u32, top: u32, width: u32, height: u32, scale: f64) -> Self {
        let left = (f64::from(left) * scale) as u32;
        let top = (f64::from(top) * scale) as u32;
        Self {
            left,
            top,
            right: left.saturating_add((f64::from(width) * scale) as u32),
            bottom: top.saturating_add((f64::from(height) * scale) as u32),
        }
    }

    /// Check `0 <= left < right <= width` and `0 <= top < bottom <= height`.
    pub fn validate(&self, width: u32, height: u32) -> Result<(), ValidationError> {
        if self.left < self.right
            && self.right <= width
            && self.top < self.bottom
            && self.bottom <= height
        {
            Ok(())
        } else {
            Err(ValidationError::InvalidCrop {
                left: self.left,
                top: self.top,
                right: self.right,
                bottom: self.bottom,
                width,
                height,
            })
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Per-slot edit parameters.
///
/// A present `crop` box means crop mode is active; `margin` is ignored then.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EditParams {
    /// Channel multiplier. 1.0 = identity, 0.0 = black. Range: 0.0–3.0.
    pub brightness: f32,
    /// Linear contrast around mid-grey. 1.0 = identity. Range: 0.0–3.0.
    pub contrast: f32,
    /// Black border added on every side, in pixels. Range: 0–300.
    pub margin: u32,
    pub crop: Option<CropBox>,
}

impl Default for EditParams {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            margin: 0,
            crop: None,
        }
    }
}

impl EditParams {
    pub fn crop_enabled(&self) -> bool {
        self.crop.is_some()
    }

    /// True when applying these parameters changes the image.
    pub fn is_edited(&self) -> bool {
        self.brightness != 1.0 || self.contrast != 1.0 || self.margin != 0 || self.crop_enabled()
    }

    /// Range-check every parameter.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_factor("brightness", self.brightness)?;
        check_factor("contrast", self.contrast)?;
        if self.margin > MAX_MARGIN {
            return Err(ValidationError::OutOfRange {
                field: "margin",
                value: f64::from(self.margin),
                min: 0.0,
                max: f64::from(MAX_MARGIN),
            });
        }
        Ok(())
    }
}

fn check_factor(field: &'static str, value: f32) -> Result<(), ValidationError> {
    if (0.0..=MAX_FACTOR).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value: f64::from(value),
            min: 0.0,
            max: f64::from(MAX_FACTOR),
        })
    }
}

/// Result of [`transform`].
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Preview / submission-ready image.
    pub image: DynamicImage,
    /// Whether `image` differs from the input.
    pub edited: bool,
    /// Set when the requested edit was rejected and the input was used as-is.
    pub warning: Option<ValidationError>,
}

/// Apply `params` to a copy of `image`.
///
/// Never fails: out-of-range parameters or an invalid crop box degrade to
/// the untransformed input with `warning` set.
pub fn transform(image: &DynamicImage, params: &EditParams) -> TransformOutput {
    let checked = params
        .validate()
        .and_then(|()| match params.crop {
            Some(crop) => crop.validate(image.width(), image.height()),
            None => Ok(()),
        });
    if let Err(e) = checked {
        return unedited(image, e);
    }

    if !params.is_edited() {
        return TransformOutput {
            image: image.clone(),
            edited: false,
            warning: None,
        };
    }

    let levelled = adjust_levels(image, params.brightness, params.contrast);
    let out = match params.crop {
        Some(c) => levelled.crop_imm(c.left, c.top, c.width(), c.height()),
        None if params.margin > 0 => match expand_margin(&levelled, params.margin) {
            Some(padded) => padded,
            None => {
                let e = ValidationError::OutOfRange {
                    field: "margin",
                    value: f64::from(params.margin),
                    min: 0.0,
                    max: f64::from(MAX_MARGIN),
                };
                return unedited(image, e);
            }
        },
        None => levelled,
    };

    debug!(
        "Transformed {}x{} → {}x{} (b={:.2}, c={:.2}, margin={}, crop={:?})",
        image.width(),
        image.height(),
        out.width(),
        out.height(),
        params.brightness,
        params.contrast,
        params.margin,
        params.crop
    );

    TransformOutput {
        image: out,
        edited: true,
        warning: None,
    }
}

fn unedited(image: &DynamicImage, warning: ValidationError) -> TransformOutput {
    warn!("{}; using the original image", warning);
    TransformOutput {
        image: image.clone(),
        edited: false,
        warning: Some(warning),
    }
}

/// Scale factor between an image and its cropper preview.
pub fn display_scale(width: u32, max_display_width: u32) -> f64 {
    if width > max_display_width && max_display_width > 0 {
        f64::from(width) / f64::from(max_display_width)
    } else {
        1.0
    }
}

/// Down-scale an image for the cropper preview, returning it with the scale
/// factor that maps preview coordinates back to the original.
pub fn resize_for_display(image: &DynamicImage, max_display_width: u32) -> (DynamicImage, f64) {
    let scale = display_scale(image.width(), max_display_width);
    if scale == 1.0 {
        return (image.clone(), scale);
    }
    let height = (f64::from(image.height()) / scale) as u32;
    let preview = image.resize_exact(max_display_width, height.max(1), FilterType::CatmullRom);
    (preview, scale)
}

// ── Point operations ─────────────────────────────────────────────────────

fn adjust_levels(image: &DynamicImage, brightness: f32, contrast: f32) -> DynamicImage {
    let mut img = to_eight_bit(image);
    if brightness == 1.0 && contrast == 1.0 {
        return img;
    }

    let lut = level_table(brightness, contrast);
    match &mut img {
        DynamicImage::ImageLuma8(buf) => apply_table(buf, &lut),
        DynamicImage::ImageLumaA8(buf) => apply_table(buf, &lut),
        DynamicImage::ImageRgb8(buf) => apply_table(buf, &lut),
        DynamicImage::ImageRgba8(buf) => apply_table(buf, &lut),
        _ => {}
    }
    img
}

/// Brightness then contrast, clamped after each step.
fn level_table(brightness: f32, contrast: f32) -> [u8; 256] {
    let b = brightness.max(0.0);
    let c = contrast.max(0.0);
    let mut lut = [0u8; 256];
    for (v, out) in lut.iter_mut().enumerate() {
        let lit = (v as f32 * b).round().clamp(0.0, 255.0);
        *out = ((lit - MIDPOINT) * c + MIDPOINT).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

fn apply_table<P: Pixel<Subpixel = u8>>(buf: &mut ImageBuffer<P, Vec<u8>>, lut: &[u8; 256]) {
    let channels = usize::from(P::CHANNEL_COUNT);
    let colour = if P::HAS_ALPHA { channels - 1 } else { channels };
    for px in buf.pixels_mut() {
        for v in &mut px.channels_mut()[..colour] {
            *v = lut[usize::from(*v)];
        }
    }
}

fn to_eight_bit(image: &DynamicImage) -> DynamicImage {
    match image.color() {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => image.clone(),
        ColorType::L16 => DynamicImage::ImageLuma8(image.to_luma8()),
        ColorType::La16 => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        c if c.has_alpha() => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

// ── Geometry ─────────────────────────────────────────────────────────────

/// `None` when the padded canvas would not fit in `u32` dimensions.
fn expand_margin(image: &DynamicImage, margin: u32) -> Option<DynamicImage> {
    let padded = match image {
        DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(pad(buf, margin, Luma([0]))?),
        DynamicImage::ImageLumaA8(buf) => {
            DynamicImage::ImageLumaA8(pad(buf, margin, LumaA([0, u8::MAX]))?)
        }
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(pad(buf, margin, Rgb([0, 0, 0]))?),
        DynamicImage::ImageRgba8(buf) => {
            DynamicImage::ImageRgba8(pad(buf, margin, Rgba([0, 0, 0, u8::MAX]))?)
        }
        other => {
            DynamicImage::ImageRgba8(pad(&other.to_rgba8(), margin, Rgba([0, 0, 0, u8::MAX]))?)
        }
    };
    Some(padded)
}

fn pad<P: Pixel<Subpixel = u8>>(
    buf: &ImageBuffer<P, Vec<u8>>,
    margin: u32,
    fill: P,
) -> Option<ImageBuffer<P, Vec<u8>>> {
    let border = margin.checked_mul(2)?;
    let width = buf.width().checked_add(border)?;
    let height = buf.height().checked_add(border)?;
    let mut canvas = ImageBuffer::from_pixel(width, height, fill);
    imageops::replace(&mut canvas, buf, i64::from(margin), i64::from(margin));
    Some(canvas)
}
