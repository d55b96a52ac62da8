//! In-process image work — pure Rust, no subprocess.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode (JPEG, TIFF, WebP, PNG)** | `image` crate (pure Rust decoders) |
//! | **Decode (AVIF)** | `avif-parse` (container) + `rav1d` (AV1 decode) + custom YUV→RGB |
//! | **Orientation** | EXIF tag via `image::metadata::Orientation`; `irot` for AVIF |
//! | **Downscale** | `image::DynamicImage::resize` (Lanczos3, fit-within, no upscale) |
//! | **Encode** | `JpegEncoder` / lossless `WebPEncoder` / `AvifEncoder` (rav1e) |
//!
//! The module is split into:
//! - **Capability**: cached check whether TIFF decoding is compiled in
//! - **Normalize**: extracted preview bytes → oriented, bounded [`PreviewImage`]
//! - **Avif**: the separate AVIF pipeline, bypassing tag selection

pub mod avif;
mod avif_decode;
pub mod capability;
pub mod normalize;

pub use avif::{avif_preview, is_avif};
pub use capability::tiff_supported;
pub use normalize::{NormalizeError, PreviewImage, normalize};
