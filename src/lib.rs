//! rawpreview — bounded raster previews for camera RAW and related formats.
//!
//! Camera RAW files (and their cousins: TIFF containers, InDesign
//! documents, AVIF photos) usually carry a ready-made preview inside the
//! container. This crate finds that embedded image with `exiftool`, pulls
//! it out, fixes its orientation, and scales it into a caller-supplied
//! bounding box. It never decodes sensor data.
//!
//! The one entry point is [`engine::PreviewEngine`]:
//!
//! ```no_run
//! use rawpreview::config::PreviewConfig;
//! use rawpreview::engine::PreviewEngine;
//! use rawpreview::source::LocalFile;
//!
//! let engine = PreviewEngine::new(&PreviewConfig::default())?;
//! if let Some(preview) = engine.extract_preview(&LocalFile::new("shot.cr2"), 256, 256) {
//!     let bytes = preview.encode(engine.settings())?;
//!     std::fs::write("shot.jpg", bytes)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Module map
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`engine`] | Orchestration and failure containment |
//! | [`probe`] | `exiftool -json` metadata probe |
//! | [`selector`] | Tag-priority selection of the extraction plan |
//! | [`extract`] | Binary tag extraction and orientation restore |
//! | [`imaging`] | Decoding, EXIF orientation, AVIF, scaling, encoding |
//! | [`source`] | Source-file abstraction and local materialization |
//! | [`tool`] | Subprocess invocation with timeout |
//! | [`tempfiles`] | Unpredictable temp names and guaranteed cleanup |
//! | [`config`] | TOML configuration, quality clamping |
//!
//! # Design notes
//!
//! - A missing preview is cosmetic, so `extract_preview` returns
//!   `Option`: every recoverable failure is logged and swallowed. Only
//!   construction can fail hard (no `exiftool` on the host).
//! - The tool is always invoked with an argument vector, never a shell,
//!   so hostile file names stay inert.
//! - Temp files live in a per-attempt [`tempfiles::TempFileSet`] that
//!   drains on scope exit, success or not.

pub mod config;
pub mod engine;
pub mod extract;
pub mod imaging;
pub mod probe;
pub mod selector;
pub mod source;
pub mod tempfiles;
pub mod tool;

pub use engine::PreviewEngine;
pub use imaging::PreviewImage;
