//! Named WebP quality presets

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Quality presets offered for WebP output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WebpPreset {
    Lossless,
    VeryHigh,
    High,
    Good,
    Balanced,
    Moderate,
    Compact,
    MaxCompression,
}

impl WebpPreset {
    pub const ALL: [WebpPreset; 8] = [
        Self::Lossless,
        Self::VeryHigh,
        Self::High,
        Self::Good,
        Self::Balanced,
        Self::Moderate,
        Self::Compact,
        Self::MaxCompression,
    ];

    /// Encoder quality for this preset
    pub fn quality(self) -> u8 {
        match self {
            Self::Lossless => 100,
            Self::VeryHigh => 97,
            Self::High => 95,
            Self::Good => 90,
            Self::Balanced => 85,
            Self::Moderate => 80,
            Self::Compact => 75,
            Self::MaxCompression => 60,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Lossless => "lossless",
            Self::VeryHigh => "very-high",
            Self::High => "high",
            Self::Good => "good",
            Self::Balanced => "balanced",
            Self::Moderate => "moderate",
            Self::Compact => "compact",
            Self::MaxCompression => "max-compression",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Lossless => "Lossless",
            Self::VeryHigh => "Very high quality",
            Self::High => "High quality",
            Self::Good => "Good quality",
            Self::Balanced => "Balanced quality",
            Self::Moderate => "Moderate compression",
            Self::Compact => "Higher compression",
            Self::MaxCompression => "Maximum compression",
        }
    }

    /// Look up a preset by name
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|p| p.name()).collect();
                ConvertError::config(format!(
                    "Preset '{}' not found. Available presets: {}",
                    name,
                    names.join(", ")
                ))
            })
    }
}

impl fmt::Display for WebpPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
