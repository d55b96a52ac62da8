//! Engine configuration.
//!
//! Loaded from an optional `rawpreview.toml`. Every field has a default, so
//! the engine works with no config file at all. Unknown keys are rejected to
//! catch typos early.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! format = ""               # Output format: "jpeg", "webp", "avif" ("" = jpeg)
//! tool_timeout_secs = 20    # Wall-clock limit per exiftool invocation
//! # exiftool = "/usr/bin/exiftool"  # Explicit tool path (default: $EXIFTOOL, then $PATH)
//!
//! [quality]
//! jpeg = 90                 # Encoding quality per output format (10-100)
//! webp = 90
//! avif = 90
//! ```
//!
//! ## Quality values
//!
//! Quality is clamped to `[10, 100]` on construction, never rejected: a host
//! admin typing `quality = 150` gets 100, not a broken thumbnailer. Values
//! that don't parse as integers (hosts sometimes store settings as strings)
//! fall back to the default of 90.
//!
//! The `webp` key is accepted but currently has no effect: the linked
//! imaging library only encodes WebP losslessly. A non-default value is
//! reported with a one-time warning at encode time.
//!
//! ## Format → quality mapping
//!
//! Each output format reads its own quality key. The mapping is an explicit
//! `match` on [`PreviewFormat`], not string concatenation, so an unrecognized
//! format tag can never silently pick up the wrong key — it resolves to the
//! JPEG default instead.

use serde::Deserializer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Encoding quality for lossy output, clamped to 10-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 10;
    pub const MAX: u8 = 100;

    pub fn new(value: i64) -> Self {
        Self(value.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u8)
    }

    /// Parse a stored config value. Hosts persist settings as strings;
    /// anything that isn't an integer resolves to the default of 90.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(value) => Self::new(value),
            Err(_) => Self::default(),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Accept both `quality = 85` and `quality = "85"`.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(Self::new(value)),
            Raw::Text(text) => Ok(Self::parse(&text)),
        }
    }
}

/// Output format for re-encoded previews.
///
/// This enum is the format-tag → quality-key mapping table. Unrecognized or
/// empty tags resolve to [`PreviewFormat::Jpeg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewFormat {
    Jpeg,
    Webp,
    Avif,
}

impl PreviewFormat {
    /// Resolve a configured format tag. `"jpg"` and `"jpeg"` are synonyms;
    /// the empty string (format unset) and unknown tags mean JPEG.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "webp" => Self::Webp,
            "avif" => Self::Avif,
            _ => Self::Jpeg,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Avif => "avif",
        }
    }
}

/// Per-format encoding quality table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityTable {
    pub jpeg: Quality,
    pub webp: Quality,
    pub avif: Quality,
}

impl QualityTable {
    /// Quality for an output format, via the explicit mapping table.
    pub fn for_format(&self, format: PreviewFormat) -> Quality {
        match format {
            PreviewFormat::Jpeg => self.jpeg,
            PreviewFormat::Webp => self.webp,
            PreviewFormat::Avif => self.avif,
        }
    }
}

/// Output format plus its quality, derived once per extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySettings {
    pub format: PreviewFormat,
    pub quality: Quality,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            format: PreviewFormat::Jpeg,
            quality: Quality::default(),
        }
    }
}

/// Engine configuration loaded from `rawpreview.toml`.
///
/// All fields have sensible defaults. Config files need only specify the
/// values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    /// Output format tag for re-encoded previews ("" = JPEG default).
    pub format: String,
    /// Per-format encoding quality (10-100).
    pub quality: QualityTable,
    /// Explicit exiftool path. When unset, `$EXIFTOOL` then `$PATH` decide.
    pub exiftool: Option<PathBuf>,
    /// Wall-clock limit per exiftool invocation. Malformed RAW files can
    /// hang the tool; the child is killed when the limit passes.
    pub tool_timeout_secs: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            format: String::new(),
            quality: QualityTable::default(),
            exiftool: None,
            tool_timeout_secs: 20,
        }
    }
}

impl PreviewConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load a config file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the output format and its quality for one attempt.
    pub fn quality_settings(&self) -> QualitySettings {
        let format = PreviewFormat::from_tag(&self.format);
        QualitySettings {
            format,
            quality: self.quality.for_format(format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 10);
        assert_eq!(Quality::new(5).value(), 10);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
        assert_eq!(Quality::new(-7).value(), 10);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn quality_parse_unparseable_falls_back_to_default() {
        assert_eq!(Quality::parse("abc").value(), 90);
        assert_eq!(Quality::parse("").value(), 90);
        assert_eq!(Quality::parse("5").value(), 10);
        assert_eq!(Quality::parse("150").value(), 100);
    }

    #[test]
    fn quality_deserializes_from_int_and_string() {
        #[derive(Deserialize)]
        struct Probe {
            q: Quality,
        }

        let from_int: Probe = toml::from_str("q = 85").unwrap();
        assert_eq!(from_int.q.value(), 85);

        let from_string: Probe = toml::from_str(r#"q = "85""#).unwrap();
        assert_eq!(from_string.q.value(), 85);

        let garbage: Probe = toml::from_str(r#"q = "abc""#).unwrap();
        assert_eq!(garbage.q.value(), 90);
    }

    #[test]
    fn format_tag_resolution() {
        assert_eq!(PreviewFormat::from_tag(""), PreviewFormat::Jpeg);
        assert_eq!(PreviewFormat::from_tag("jpg"), PreviewFormat::Jpeg);
        assert_eq!(PreviewFormat::from_tag("jpeg"), PreviewFormat::Jpeg);
        assert_eq!(PreviewFormat::from_tag("WEBP"), PreviewFormat::Webp);
        assert_eq!(PreviewFormat::from_tag("avif"), PreviewFormat::Avif);
        // Unrecognized tags never pick up a foreign quality key.
        assert_eq!(PreviewFormat::from_tag("bmp"), PreviewFormat::Jpeg);
    }

    #[test]
    fn quality_table_maps_per_format() {
        let table: QualityTable = toml::from_str("jpeg = 80\nwebp = 70\navif = 60").unwrap();
        assert_eq!(table.for_format(PreviewFormat::Jpeg).value(), 80);
        assert_eq!(table.for_format(PreviewFormat::Webp).value(), 70);
        assert_eq!(table.for_format(PreviewFormat::Avif).value(), 60);
    }

    #[test]
    fn default_config_values() {
        let config = PreviewConfig::default();
        assert_eq!(config.format, "");
        assert_eq!(config.tool_timeout_secs, 20);
        assert!(config.exiftool.is_none());

        let settings = config.quality_settings();
        assert_eq!(settings.format, PreviewFormat::Jpeg);
        assert_eq!(settings.quality.value(), 90);
    }

    #[test]
    fn quality_settings_follow_configured_format() {
        let config = PreviewConfig {
            format: "avif".into(),
            quality: QualityTable {
                avif: Quality::new(55),
                ..QualityTable::default()
            },
            ..PreviewConfig::default()
        };

        let settings = config.quality_settings();
        assert_eq!(settings.format, PreviewFormat::Avif);
        assert_eq!(settings.quality.value(), 55);
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let err = toml::from_str::<PreviewConfig>("fromat = \"jpeg\"");
        assert!(err.is_err());
    }

    #[test]
    fn load_partial_config() {
        let config: PreviewConfig =
            toml::from_str("format = \"webp\"\n[quality]\nwebp = 75").unwrap();
        let settings = config.quality_settings();
        assert_eq!(settings.format, PreviewFormat::Webp);
        assert_eq!(settings.quality.value(), 75);
        // Untouched keys keep the default.
        assert_eq!(config.quality.jpeg.value(), 90);
    }

    #[test]
    fn load_or_default_missing_file() {
        let config = PreviewConfig::load_or_default(Path::new("/nonexistent/rawpreview.toml"));
        assert_eq!(config.unwrap().tool_timeout_secs, 20);
    }
}
