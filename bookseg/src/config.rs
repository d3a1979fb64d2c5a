//! Segmentation configuration, loaded from TOML.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::detect::Strategy;
use crate::error::{Result, SegmentError};

// Defaults tuned for secondary-heading chapters ("## 3 Title") in OCR'd books
const DEFAULT_HEADING_MARKER_COUNT: usize = 2;
const DEFAULT_MIN_TITLE_LENGTH: usize = 10;
const DEFAULT_MAX_SPECIAL_CHAR_RATIO: f64 = 0.3;
const DEFAULT_MIN_ORDINAL: u32 = 1;
const DEFAULT_MAX_ORDINAL: u32 = 50;
const DEFAULT_MIN_ACCEPTED: usize = 5;
const DEFAULT_MAX_ACCEPTED: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Detection strategy (pattern or structural)
    #[serde(default)]
    pub strategy: Strategy,

    /// Number of `#` markers a chapter heading carries (heading level)
    #[serde(default = "default_heading_marker_count")]
    pub heading_marker_count: usize,

    /// Regex overriding the built-in heading line pattern.
    /// Must define an `ordinal` group; a `title` group is optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_pattern: Option<String>,

    /// Minimum length in characters of the trimmed heading line
    #[serde(default = "default_min_title_length")]
    pub min_title_length: usize,

    /// Maximum fraction of symbol characters in the heading line (0.0-1.0)
    #[serde(default = "default_max_special_char_ratio")]
    pub max_special_char_ratio: f64,

    /// Lowest plausible chapter number
    #[serde(default = "default_min_ordinal")]
    pub min_ordinal: u32,

    /// Highest plausible chapter number
    #[serde(default = "default_max_ordinal")]
    pub max_ordinal: u32,

    /// Fewer accepted boundaries than this flags the run for review
    #[serde(default = "default_min_accepted")]
    pub min_accepted_boundaries: usize,

    /// More accepted boundaries than this flags the run for review
    #[serde(default = "default_max_accepted")]
    pub max_accepted_boundaries: usize,

    /// Minimum line distance from the previous candidate; 0 disables the rule
    #[serde(default)]
    pub min_spacing_lines: usize,

    /// Chapter file name prefix
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Chapter file extension (without the dot); empty for none
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
}

fn default_heading_marker_count() -> usize {
    DEFAULT_HEADING_MARKER_COUNT
}

fn default_min_title_length() -> usize {
    DEFAULT_MIN_TITLE_LENGTH
}

fn default_max_special_char_ratio() -> f64 {
    DEFAULT_MAX_SPECIAL_CHAR_RATIO
}

fn default_min_ordinal() -> u32 {
    DEFAULT_MIN_ORDINAL
}

fn default_max_ordinal() -> u32 {
    DEFAULT_MAX_ORDINAL
}

fn default_min_accepted() -> usize {
    DEFAULT_MIN_ACCEPTED
}

fn default_max_accepted() -> usize {
    DEFAULT_MAX_ACCEPTED
}

fn default_file_prefix() -> String {
    "chapter".to_string()
}

fn default_file_extension() -> String {
    "md".to_string()
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            heading_marker_count: default_heading_marker_count(),
            heading_pattern: None,
            min_title_length: default_min_title_length(),
            max_special_char_ratio: default_max_special_char_ratio(),
            min_ordinal: default_min_ordinal(),
            max_ordinal: default_max_ordinal(),
            min_accepted_boundaries: default_min_accepted(),
            max_accepted_boundaries: default_max_accepted(),
            min_spacing_lines: 0,
            file_prefix: default_file_prefix(),
            file_extension: default_file_extension(),
        }
    }
}

impl SplitConfig {
    /// Get the config file path: ~/.config/cli-programs/bookseg.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| SegmentError::InvalidConfig("HOME not set".into()))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("cli-programs")
            .join("bookseg.toml"))
    }

    /// Load config from the default location, returning defaults if the file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: SplitConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.heading_marker_count == 0 || self.heading_marker_count > 6 {
            return Err(SegmentError::InvalidConfig(format!(
                "heading_marker_count must be between 1 and 6, got {}",
                self.heading_marker_count
            )));
        }
        if self.min_ordinal > self.max_ordinal {
            return Err(SegmentError::InvalidConfig(format!(
                "min_ordinal ({}) exceeds max_ordinal ({})",
                self.min_ordinal, self.max_ordinal
            )));
        }
        if self.min_accepted_boundaries > self.max_accepted_boundaries {
            return Err(SegmentError::InvalidConfig(format!(
                "min_accepted_boundaries ({}) exceeds max_accepted_boundaries ({})",
                self.min_accepted_boundaries, self.max_accepted_boundaries
            )));
        }
        if !(0.0..=1.0).contains(&self.max_special_char_ratio) {
            return Err(SegmentError::InvalidConfig(format!(
                "max_special_char_ratio must be within 0.0-1.0, got {}",
                self.max_special_char_ratio
            )));
        }
        if let Some(pattern) = &self.heading_pattern {
            compile_heading_pattern(pattern)?;
        }
        if self.file_prefix.trim().is_empty() || self.file_prefix.contains(['/', '\\']) {
            return Err(SegmentError::InvalidConfig(format!(
                "file_prefix must be a plain non-empty name, got {:?}",
                self.file_prefix
            )));
        }
        Ok(())
    }
}

/// Compile a heading regex, requiring an `ordinal` capture group.
pub fn compile_heading_pattern(pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern)?;
    if !regex.capture_names().flatten().any(|name| name == "ordinal") {
        return Err(SegmentError::InvalidConfig(format!(
            "heading_pattern must define an `ordinal` capture group: {}",
            pattern
        )));
    }
    Ok(regex)
}
