//! Format normalization — extracted bytes to a bounded, upright image.
//!
//! Two inbound paths, decided by the extraction plan:
//!
//! - **JPEG-family**: the tag payload is already JPEG; load it directly,
//!   applying the EXIF orientation the extractor restored onto it.
//! - **TIFF-family**: decode the TIFF, orient it, re-encode to an in-memory
//!   JPEG buffer and load *that*. The working image handed to callers is
//!   always backed by plain 8-bit raster data, whatever exotic sample
//!   layout the TIFF used.
//!
//! Both paths end the same way: downscale-to-fit the requested bounds
//! (aspect preserved, never enlarging) and a validity check. Malformed pixel
//! data is an error for the engine to log — callers only ever see "no
//! preview", whether the cause was a missing tag or corrupt bytes.

use super::capability::tiff_supported;
use crate::config::{PreviewFormat, Quality, QualitySettings};
use crate::selector::PreviewKind;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::{BufRead, Cursor, Seek};
use std::path::Path;
use thiserror::Error;

/// Quality for the intermediate JPEG produced from TIFF input. Not user
/// configurable; the configured quality applies to the final output format.
const TIFF_INTERMEDIATE_QUALITY: u8 = 90;

/// AVIF encoder speed, same throughput/size trade-off for every encode.
pub(crate) const AVIF_ENCODER_SPEED: u8 = 6;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode preview data: {0}")]
    Decode(String),
    #[error("failed to encode preview: {0}")]
    Encode(String),
    #[error("TIFF preview requires TIFF decode support")]
    TiffUnsupported,
}

/// A decoded, oriented, bounded preview ready to hand to the caller.
///
/// Constructing one is the validity check: zero-dimension or undecodable
/// data never becomes a `PreviewImage`.
#[derive(Debug)]
pub struct PreviewImage {
    image: DynamicImage,
}

impl PreviewImage {
    pub(crate) fn try_new(image: DynamicImage) -> Result<Self, NormalizeError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(NormalizeError::Decode("image has no pixels".into()));
        }
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    /// Encode to the configured output format at the configured quality.
    pub fn encode(&self, settings: &QualitySettings) -> Result<Vec<u8>, NormalizeError> {
        encode_image(&self.image, settings)
    }
}

/// Normalize an extracted preview file into a bounded [`PreviewImage`].
pub fn normalize(
    path: &Path,
    kind: PreviewKind,
    max_width: u32,
    max_height: u32,
) -> Result<PreviewImage, NormalizeError> {
    let image = match kind {
        PreviewKind::Jpeg => load_oriented(path)?,
        PreviewKind::Tiff => {
            if !tiff_supported() {
                return Err(NormalizeError::TiffUnsupported);
            }
            let tiff = load_oriented(path)?;
            let jpeg = encode_jpeg(&tiff, TIFF_INTERMEDIATE_QUALITY)?;
            decode_oriented(ImageReader::new(Cursor::new(jpeg)).with_guessed_format()?)?
        }
    };

    PreviewImage::try_new(downscale_to_fit(image, max_width, max_height))
}

/// Load an image from disk with its EXIF orientation applied.
pub fn load_oriented(path: &Path) -> Result<DynamicImage, NormalizeError> {
    decode_oriented(ImageReader::open(path)?.with_guessed_format()?)
}

/// Load an image from memory with its EXIF orientation applied.
pub fn load_oriented_bytes(bytes: &[u8]) -> Result<DynamicImage, NormalizeError> {
    decode_oriented(ImageReader::new(Cursor::new(bytes)).with_guessed_format()?)
}

fn decode_oriented<R: BufRead + Seek>(
    reader: ImageReader<R>,
) -> Result<DynamicImage, NormalizeError> {
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| NormalizeError::Decode(e.to_string()))?;
    // A preview with an unreadable orientation tag is still a preview.
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder)
        .map_err(|e| NormalizeError::Decode(e.to_string()))?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Dimensions after downscale-to-fit: aspect preserved, neither dimension
/// above its bound, and never larger than the source.
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (width, height) = source;
    let (max_width, max_height) = bounds;

    if width <= max_width && height <= max_height {
        return source;
    }

    let scale = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let scaled_w = ((f64::from(width) * scale).round() as u32).clamp(1, max_width.max(1));
    let scaled_h = ((f64::from(height) * scale).round() as u32).clamp(1, max_height.max(1));
    (scaled_w, scaled_h)
}

/// Downscale so the image fits within the bounds. A source already inside
/// the bounds is returned untouched; previews are never upscaled.
pub fn downscale_to_fit(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let target = fit_within((image.width(), image.height()), (max_width, max_height));
    if target == (image.width(), image.height()) {
        return image;
    }
    image.resize_exact(target.0, target.1, FilterType::Lanczos3)
}

/// Encode to the configured output format at the configured quality.
pub(crate) fn encode_image(
    image: &DynamicImage,
    settings: &QualitySettings,
) -> Result<Vec<u8>, NormalizeError> {
    match settings.format {
        PreviewFormat::Jpeg => encode_jpeg(image, settings.quality.value()),
        PreviewFormat::Webp => {
            // The image crate's WebP encoder is lossless-only; the quality
            // setting does not apply to it. Tell the admin once rather
            // than silently ignoring their config.
            if settings.quality != Quality::default() {
                static WEBP_QUALITY_IGNORED: std::sync::Once = std::sync::Once::new();
                WEBP_QUALITY_IGNORED.call_once(|| {
                    tracing::warn!(
                        quality = settings.quality.value(),
                        "webp output is always lossless; the configured webp quality is ignored"
                    );
                });
            }
            let mut buf = Cursor::new(Vec::new());
            let encoder = WebPEncoder::new_lossless(&mut buf);
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_with_encoder(encoder)
                .map_err(|e| NormalizeError::Encode(e.to_string()))?;
            Ok(buf.into_inner())
        }
        PreviewFormat::Avif => {
            let mut buf = Cursor::new(Vec::new());
            let encoder = AvifEncoder::new_with_speed_quality(
                &mut buf,
                AVIF_ENCODER_SPEED,
                settings.quality.value(),
            );
            image
                .write_with_encoder(encoder)
                .map_err(|e| NormalizeError::Encode(e.to_string()))?;
            Ok(buf.into_inner())
        }
    }
}

/// Encode to an in-memory JPEG buffer. JPEG has no alpha, so the image is
/// flattened to RGB first.
pub(crate) fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, NormalizeError> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| NormalizeError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}
