//! Binary extraction of the chosen preview candidate.
//!
//! Second exiftool invocation of an attempt: pull exactly one tag's payload
//! into a fresh temp file,
//!
//! ```text
//! exiftool -ignoreMinorErrors -b -<Tag> <source>   # stdout → temp file
//! ```
//!
//! then a third to restore the orientation metadata that raw preview
//! extraction drops,
//!
//! ```text
//! exiftool -ignoreMinorErrors -TagsFromFile <source> -orientation
//!          -overwrite_original <temp>
//! ```
//!
//! exiftool reports success even when a tag yields nothing useful, so the
//! extracted file must clear a small size floor before it counts. The temp
//! file is registered *before* the tool runs; whatever the tool leaves
//! behind on failure is cleaned up with the rest of the attempt.

use crate::selector::{ExtractionPlan, PlanSource};
use crate::tempfiles::{TempFileSet, unique_path};
use crate::tool::{ToolError, ToolInvoker, args};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Anything below this is padding or an error message, not an image.
pub const MIN_PREVIEW_BYTES: u64 = 100;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("tool invocation failed: {0}")]
    Tool(#[from] ToolError),
    #[error("extracted preview is too small ({bytes} bytes)")]
    TooSmall { bytes: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Materialize the planned preview candidate as a local file.
///
/// A [`PlanSource::SourceFile`] plan short-circuits: the source file itself
/// is the preview, no subprocess, no temp file. Otherwise the tag payload is
/// extracted into a registered temp file and its orientation restored.
pub fn extract(
    tool: &dyn ToolInvoker,
    local: &Path,
    plan: &ExtractionPlan,
    tmp: &mut TempFileSet,
) -> Result<PathBuf, ExtractError> {
    let tag = match plan.source {
        PlanSource::SourceFile => return Ok(local.to_path_buf()),
        PlanSource::Tag(tag) => tag,
    };

    let out = unique_path(local, plan.kind.extension());
    tmp.register(out.clone());

    let tag_flag = OsString::from(format!("-{tag}"));
    tool.run(
        &args(&[&"-ignoreMinorErrors", &"-b", &tag_flag, &local]),
        Some(&out),
    )?;

    let bytes = fs::metadata(&out).map(|m| m.len()).unwrap_or(0);
    if bytes < MIN_PREVIEW_BYTES {
        return Err(ExtractError::TooSmall { bytes });
    }

    restore_orientation(tool, local, &out);
    Ok(out)
}

/// Copy the orientation tag from the source onto the extracted preview.
///
/// Best-effort: a preview with stale orientation is still a preview, so a
/// failure here is logged and the extraction stands.
fn restore_orientation(tool: &dyn ToolInvoker, source: &Path, extracted: &Path) {
    let result = tool.run(
        &args(&[
            &"-ignoreMinorErrors",
            &"-TagsFromFile",
            &source,
            &"-orientation",
            &"-overwrite_original",
            &extracted,
        ]),
        None,
    );
    if let Err(err) = result {
        warn!(source = %source.display(), %err, "could not restore orientation on preview");
    }
}
