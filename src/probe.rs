//! Metadata probing — which previews does this file carry?
//!
//! One read-only exiftool call per attempt:
//!
//! ```text
//! exiftool -json -preview:all -FileType <file>
//! ```
//!
//! No binary payloads are requested here; `-preview:all` only lists the
//! preview tags present (with size hints), which is all the selector needs.
//!
//! Parsing is deliberately forgiving. Malformed JSON, an empty record list,
//! or a file exiftool does not understand all yield an *empty*
//! [`ProbeResult`] rather than an error: "no known tags" is meaningful input
//! to the selector, which turns it into its own definitive failure.

use crate::tool::{ToolError, ToolInvoker, args};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Declared file type when exiftool reports none.
pub const UNKNOWN_FILE_TYPE: &str = "n/a";

/// Container type and preview tags found in one source file.
///
/// Produced once per attempt and consumed by the selector; never mutated.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Container file type as declared by exiftool (e.g. "TIFF", "CR2").
    pub file_type: String,
    /// Preview tags present, with whatever hint exiftool printed for each
    /// (usually a "(Binary data N bytes ...)" placeholder).
    pub tags: BTreeMap<String, Value>,
}

impl Default for ProbeResult {
    fn default() -> Self {
        Self {
            file_type: UNKNOWN_FILE_TYPE.to_string(),
            tags: BTreeMap::new(),
        }
    }
}

impl ProbeResult {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }
}

/// Run the structured probe against a local file.
///
/// Tool-level failures (spawn, timeout, non-zero exit) propagate; output the
/// tool *did* produce is parsed leniently via [`parse_probe_output`].
pub fn probe(tool: &dyn ToolInvoker, local: &Path) -> Result<ProbeResult, ToolError> {
    let output = tool.run(
        &args(&[&"-json", &"-preview:all", &"-FileType", &local]),
        None,
    )?;
    let result = parse_probe_output(&output.stdout);
    debug!(
        file_type = %result.file_type,
        tags = ?result.tags.keys().collect::<Vec<_>>(),
        "probe complete"
    );
    Ok(result)
}

/// Parse exiftool's `-json` output into a [`ProbeResult`].
///
/// exiftool prints one JSON object per input file; we only ever pass one
/// file, so only the first record counts. `SourceFile` is bookkeeping that
/// exiftool adds to every record, not a preview tag, and is dropped.
pub fn parse_probe_output(stdout: &[u8]) -> ProbeResult {
    let records: Vec<BTreeMap<String, Value>> = match serde_json::from_slice(stdout) {
        Ok(records) => records,
        Err(err) => {
            debug!(%err, "probe output was not valid JSON");
            return ProbeResult::default();
        }
    };

    let Some(mut record) = records.into_iter().next() else {
        return ProbeResult::default();
    };

    let file_type = record
        .remove("FileType")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_FILE_TYPE.to_string());
    record.remove("SourceFile");

    ProbeResult {
        file_type,
        tags: record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::tests::{MockInvoker, MockResponse};
    use std::ffi::OsString;

    const CR2_PROBE: &str = r#"[{
        "SourceFile": "/photos/IMG_0001.CR2",
        "FileType": "CR2",
        "PreviewImage": "(Binary data 1327049 bytes, use -b option to extract)",
        "ThumbnailImage": "(Binary data 11204 bytes, use -b option to extract)"
    }]"#;

    #[test]
    fn parses_file_type_and_tags() {
        let result = parse_probe_output(CR2_PROBE.as_bytes());
        assert_eq!(result.file_type, "CR2");
        assert!(result.has_tag("PreviewImage"));
        assert!(result.has_tag("ThumbnailImage"));
        // SourceFile is exiftool bookkeeping, never a preview tag.
        assert!(!result.has_tag("SourceFile"));
        assert_eq!(result.tags.len(), 2);
    }

    #[test]
    fn missing_file_type_reads_as_unknown() {
        let result = parse_probe_output(br#"[{"SourceFile": "x.bin"}]"#);
        assert_eq!(result.file_type, UNKNOWN_FILE_TYPE);
        assert!(result.tags.is_empty());
    }

    #[test]
    fn malformed_json_yields_empty_result() {
        let result = parse_probe_output(b"exiftool: not a recognized file");
        assert_eq!(result.file_type, UNKNOWN_FILE_TYPE);
        assert!(result.tags.is_empty());
    }

    #[test]
    fn empty_record_list_yields_empty_result() {
        let result = parse_probe_output(b"[]");
        assert_eq!(result.file_type, UNKNOWN_FILE_TYPE);
        assert!(result.tags.is_empty());
    }

    #[test]
    fn probe_requests_structured_output_only() {
        let mock = MockInvoker::scripted(vec![MockResponse::ok(CR2_PROBE.as_bytes())]);

        let result = probe(&mock, Path::new("/photos/IMG_0001.CR2")).unwrap();
        assert_eq!(result.file_type, "CR2");

        let calls = mock.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(&OsString::from("-json")));
        assert!(calls[0].contains(&OsString::from("-preview:all")));
        // Structured mode never asks for binary payloads.
        assert!(!calls[0].contains(&OsString::from("-b")));
    }

    #[test]
    fn probe_propagates_tool_failure() {
        let mock = MockInvoker::scripted(vec![MockResponse::failed()]);
        let result = probe(&mock, Path::new("/photos/x.cr2"));
        assert!(result.is_err());
    }
}
