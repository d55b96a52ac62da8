//! Preview-tag selection — pure decision logic, no I/O.
//!
//! Given a probe result and the TIFF capability flag, pick exactly one
//! extraction strategy. Priority order is a quality/cost trade-off:
//!
//! 1. JPEG-producing tags, best first: `JpgFromRaw` (full-size render),
//!    `PageImage` (INDD page), `PreviewImage`, `OtherImage`,
//!    `ThumbnailImage` (tiny, last resort). Already-compressed JPEG needs no
//!    re-encoding and is usually the highest-fidelity candidate.
//! 2. A TIFF container with no preview tags at all: use the source file
//!    itself — more pixels to push, but lossless. This fallback is
//!    deliberately limited to TIFF; untagged RAW containers have nothing
//!    the imaging library could decode.
//! 3. `PreviewTIFF`/`ThumbnailTIFF` tags: need the TIFF decode capability,
//!    and fail fast here when it is missing. Deferring that check to the
//!    extractor would waste a subprocess call on a plan that cannot work.
//!
//! Tag enumeration order in the probe result never affects the choice; the
//! priority lists below are fixed.

use crate::probe::ProbeResult;
use thiserror::Error;

/// JPEG-payload tags, highest priority first.
pub const JPEG_TAGS: [&str; 5] = [
    "JpgFromRaw",
    "PageImage",
    "PreviewImage",
    "OtherImage",
    "ThumbnailImage",
];

/// TIFF-payload tags, checked only after the JPEG tags and the direct-TIFF
/// fallback.
pub const TIFF_TAGS: [&str; 2] = ["PreviewTIFF", "ThumbnailTIFF"];

/// Payload family of the chosen candidate; decides the normalizer path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Jpeg,
    Tiff,
}

impl PreviewKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Tiff => "tiff",
        }
    }
}

/// Where the preview bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    /// Extract this exiftool tag's binary payload.
    Tag(&'static str),
    /// No embedded preview; the source file itself is the preview.
    SourceFile,
}

/// The one extraction strategy chosen for this attempt. Immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionPlan {
    pub source: PlanSource,
    pub kind: PreviewKind,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectError {
    #[error("file has no usable preview data")]
    NoPreviewData,
    #[error("TIFF preview found but TIFF decoding is not available")]
    TiffUnsupported,
}

/// Pick the extraction plan for one probed file.
///
/// Deterministic: the same probe result and capability flag always produce
/// the same plan. A TIFF-family plan is only ever returned when
/// `tiff_capable` is true.
pub fn select(probe: &ProbeResult, tiff_capable: bool) -> Result<ExtractionPlan, SelectError> {
    for tag in JPEG_TAGS {
        if probe.has_tag(tag) {
            return Ok(ExtractionPlan {
                source: PlanSource::Tag(tag),
                kind: PreviewKind::Jpeg,
            });
        }
    }

    if probe.file_type == "TIFF" && tiff_capable {
        return Ok(ExtractionPlan {
            source: PlanSource::SourceFile,
            kind: PreviewKind::Tiff,
        });
    }

    for tag in TIFF_TAGS {
        if probe.has_tag(tag) {
            if !tiff_capable {
                return Err(SelectError::TiffUnsupported);
            }
            return Ok(ExtractionPlan {
                source: PlanSource::Tag(tag),
                kind: PreviewKind::Tiff,
            });
        }
    }

    Err(SelectError::NoPreviewData)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn probe_with(file_type: &str, tags: &[&str]) -> ProbeResult {
        ProbeResult {
            file_type: file_type.to_string(),
            tags: tags
                .iter()
                .map(|t| (t.to_string(), Value::String("(Binary data)".into())))
                .collect(),
        }
    }

    #[test]
    fn picks_highest_priority_jpeg_tag() {
        let probe = probe_with("CR2", &["ThumbnailImage", "PreviewImage", "JpgFromRaw"]);
        let plan = select(&probe, true).unwrap();
        assert_eq!(plan.source, PlanSource::Tag("JpgFromRaw"));
        assert_eq!(plan.kind, PreviewKind::Jpeg);
    }

    #[test]
    fn priority_order_is_fixed() {
        // Walk the list: removing the best tag promotes the next one.
        let mut tags: Vec<&str> = JPEG_TAGS.to_vec();
        while let Some(&expected) = tags.first() {
            let probe = probe_with("NEF", &tags);
            let plan = select(&probe, false).unwrap();
            assert_eq!(plan.source, PlanSource::Tag(expected));
            tags.remove(0);
        }
    }

    #[test]
    fn selection_ignores_tag_enumeration_order() {
        // BTreeMap iterates alphabetically (PageImage < PreviewImage), but
        // insertion order here is reversed too; neither may matter.
        let forward = probe_with("ORF", &["PageImage", "PreviewImage"]);
        let backward = probe_with("ORF", &["PreviewImage", "PageImage"]);
        assert_eq!(select(&forward, true), select(&backward, true));
        assert_eq!(
            select(&forward, true).unwrap().source,
            PlanSource::Tag("PageImage")
        );
    }

    #[test]
    fn jpeg_tag_wins_over_tiff_fallback() {
        let probe = probe_with("TIFF", &["ThumbnailImage"]);
        let plan = select(&probe, true).unwrap();
        assert_eq!(plan.source, PlanSource::Tag("ThumbnailImage"));
        assert_eq!(plan.kind, PreviewKind::Jpeg);
    }

    #[test]
    fn untagged_tiff_uses_source_file_directly() {
        let probe = probe_with("TIFF", &[]);
        let plan = select(&probe, true).unwrap();
        assert_eq!(plan.source, PlanSource::SourceFile);
        assert_eq!(plan.kind, PreviewKind::Tiff);
    }

    #[test]
    fn untagged_tiff_without_capability_fails() {
        let probe = probe_with("TIFF", &[]);
        assert_eq!(select(&probe, false), Err(SelectError::NoPreviewData));
    }

    #[test]
    fn source_fallback_is_tiff_only() {
        // An untagged RAW container never falls back to the source file.
        let probe = probe_with("CR2", &[]);
        assert_eq!(select(&probe, true), Err(SelectError::NoPreviewData));
    }

    #[test]
    fn tiff_preview_tag_requires_capability() {
        let probe = probe_with("RAF", &["PreviewTIFF"]);

        let plan = select(&probe, true).unwrap();
        assert_eq!(plan.source, PlanSource::Tag("PreviewTIFF"));
        assert_eq!(plan.kind, PreviewKind::Tiff);

        assert_eq!(select(&probe, false), Err(SelectError::TiffUnsupported));
    }

    #[test]
    fn never_returns_tiff_plan_without_capability() {
        let probes = [
            probe_with("TIFF", &[]),
            probe_with("RAF", &["PreviewTIFF"]),
            probe_with("RAF", &["ThumbnailTIFF"]),
        ];
        for probe in &probes {
            if let Ok(plan) = select(probe, false) {
                assert_ne!(plan.kind, PreviewKind::Tiff);
            }
        }
    }

    #[test]
    fn jpeg_fallthrough_past_unavailable_tiff_tags() {
        // A JPEG tag lower in priority than nothing at all: with no TIFF
        // capability, a file carrying both PreviewTIFF and ThumbnailImage
        // still succeeds through the JPEG path.
        let probe = probe_with("RAF", &["PreviewTIFF", "ThumbnailImage"]);
        let plan = select(&probe, false).unwrap();
        assert_eq!(plan.source, PlanSource::Tag("ThumbnailImage"));
    }

    #[test]
    fn nothing_usable_is_a_definitive_failure() {
        let probe = probe_with("n/a", &[]);
        assert_eq!(select(&probe, true), Err(SelectError::NoPreviewData));
    }
}
