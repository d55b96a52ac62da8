//! The preview-extraction engine.
//!
//! One public operation: [`PreviewEngine::extract_preview`] — source handle
//! plus bounds in, `Option<PreviewImage>` out. A missing thumbnail is a
//! cosmetic degradation, not a fatal condition, so the engine *never* lets
//! an error escape this call: every expected failure mode (unreadable
//! source, no usable tags, tool trouble, corrupt pixel data) collapses to
//! `None` plus a logged warning. The only hard failure is construction-time:
//! no exiftool binary on the host.
//!
//! Per attempt:
//!
//! ```text
//! resolve local path
//!   ├── AVIF?  → decode in-process, orient, re-encode, bound      (no tool)
//!   └── else   → probe tags → select plan → extract tag → normalize
//! ```
//!
//! A [`TempFileSet`] is created per attempt and drained exactly once, on
//! success and failure alike. Attempts share no mutable state; concurrent
//! extraction is safe on temp-name uniqueness alone.

use crate::config::{PreviewConfig, QualitySettings};
use crate::extract::{self, ExtractError};
use crate::imaging::{self, NormalizeError, PreviewImage};
use crate::probe::{self, ProbeResult};
use crate::selector::{self, SelectError};
use crate::source::{SourceFile, resolve_local};
use crate::tempfiles::TempFileSet;
use crate::tool::{ExifTool, SetupError, ToolError, ToolInvoker};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// File extensions this engine produces previews for. RAW formats and the
/// INDD/TIFF containers go through exiftool; AVIF decodes in-process.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "3fr", "arw", "cr2", "cr3", "crw", "dng", "erf", "fff", "iiq", "kdc", "mrw", "nef", "nrw",
    "orf", "ori", "pef", "raf", "rw2", "rwl", "sr2", "srf", "srw", "x3f", // RAW
    "indd", // InDesign documents carry a PageImage preview
    "tif", "tiff", "avif",
];

/// Per-attempt failure. Never escapes [`PreviewEngine::extract_preview`];
/// the variants exist so the log line says which stage gave up.
#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("source not readable: {0}")]
    Input(#[from] std::io::Error),
    #[error("metadata probe failed: {0}")]
    Probe(#[from] ToolError),
    #[error(transparent)]
    Selection(#[from] SelectError),
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error(transparent)]
    Decode(#[from] NormalizeError),
}

/// The engine. Construct once per process; cheap to share.
pub struct PreviewEngine {
    tool: Box<dyn ToolInvoker>,
    settings: QualitySettings,
}

impl PreviewEngine {
    /// Build an engine from configuration, resolving the exiftool binary.
    ///
    /// This is the only hard failure in the crate: without a tool the
    /// engine is unusable, and the host should find out at startup rather
    /// than per-thumbnail.
    pub fn new(config: &PreviewConfig) -> Result<Self, SetupError> {
        let tool = ExifTool::resolve(
            config.exiftool.as_deref(),
            Duration::from_secs(config.tool_timeout_secs),
        )?;
        debug!(program = %tool.program().display(), "resolved exiftool");
        Ok(Self::with_invoker(Box::new(tool), config.quality_settings()))
    }

    /// Build an engine around a specific invoker (allows testing with mock).
    pub fn with_invoker(tool: Box<dyn ToolInvoker>, settings: QualitySettings) -> Self {
        Self { tool, settings }
    }

    pub fn settings(&self) -> &QualitySettings {
        &self.settings
    }

    /// Is a preview attempt worth making for this file?
    ///
    /// Zero-byte files never have one; TIFF needs the decode capability.
    pub fn is_available(extension: &str, size: u64) -> bool {
        if size == 0 {
            return false;
        }
        let ext = extension.to_ascii_lowercase();
        if matches!(ext.as_str(), "tif" | "tiff") && !imaging::tiff_supported() {
            return false;
        }
        SUPPORTED_EXTENSIONS.contains(&ext.as_str())
    }

    /// Extract a preview bounded to `max_width` × `max_height`.
    ///
    /// Returns `None` for every expected failure mode; see the module docs.
    /// Never panics, never leaks temp files.
    pub fn extract_preview(
        &self,
        source: &dyn SourceFile,
        max_width: u32,
        max_height: u32,
    ) -> Option<PreviewImage> {
        let mut tmp = TempFileSet::new();
        let outcome = self.attempt(source, max_width, max_height, &mut tmp);
        // The one drain per attempt. `TempFileSet` also drains on drop, so
        // an unwind between here and `attempt` cannot leak either.
        tmp.drain();

        match outcome {
            Ok(preview) => Some(preview),
            Err(err) => {
                warn!(%err, "preview extraction failed");
                None
            }
        }
    }

    fn attempt(
        &self,
        source: &dyn SourceFile,
        max_width: u32,
        max_height: u32,
        tmp: &mut TempFileSet,
    ) -> Result<PreviewImage, PreviewError> {
        let local = resolve_local(source, tmp)?;

        if imaging::is_avif(&local) {
            debug!(path = %local.display(), "taking the AVIF path");
            return Ok(imaging::avif_preview(
                &local,
                max_width,
                max_height,
                &self.settings,
            )?);
        }

        let probed = probe::probe(self.tool.as_ref(), &local)?;
        let plan = selector::select(&probed, imaging::tiff_supported())?;
        debug!(?plan, "selected extraction plan");

        let extracted = extract::extract(self.tool.as_ref(), &local, &plan, tmp)?;
        Ok(imaging::normalize(
            &extracted,
            plan.kind,
            max_width,
            max_height,
        )?)
    }

    /// Run the metadata probe against a local file. Exposed for the CLI's
    /// `probe` subcommand; `extract_preview` covers everything else.
    pub fn probe_file(&self, path: &Path) -> Result<ProbeResult, PreviewError> {
        Ok(probe::probe(self.tool.as_ref(), path)?)
    }
}
