//! TIFF capability probe.
//!
//! The direct-TIFF fallback and the `PreviewTIFF`/`ThumbnailTIFF` tag paths
//! only work when the linked `image` crate can actually decode TIFF pixel
//! data. Whether it can is a compile-time property of the enabled cargo
//! features, so the answer is computed once and cached for the process
//! lifetime; nothing re-probes mid-attempt.

use image::ImageFormat;
use std::sync::LazyLock;

static TIFF_DECODING: LazyLock<bool> = LazyLock::new(|| ImageFormat::Tiff.reading_enabled());

/// True when the imaging library reports TIFF among its decodable formats.
pub fn tiff_supported() -> bool {
    *TIFF_DECODING
}
