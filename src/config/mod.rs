//! Configuration management for FastConvert

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

pub mod presets;
pub use presets::*;

/// Long-side bound applied when downscaling is enabled
pub const DEFAULT_MAX_DIMENSION: u32 = 1440;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// What to produce
    pub conversion: ConversionConfig,

    /// How to run the batch
    pub processing: ProcessingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Output format and encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Target format for every converted file
    pub format: TargetFormat,

    /// WebP quality (1-100, 100 = lossless)
    pub quality: u8,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// Downscale so the long side fits this bound
    pub max_dimension: u32,

    /// Skip downscaling entirely
    pub no_limit: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            format: TargetFormat::Webp,
            quality: WebpPreset::Good.quality(),
            jpeg_quality: 80,
            max_dimension: DEFAULT_MAX_DIMENSION,
            no_limit: false,
        }
    }
}

impl ConversionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.format == TargetFormat::Webp && !(1..=100).contains(&self.quality) {
            return Err(ConvertError::config(format!(
                "WebP quality must be between 1 and 100, got {}",
                self.quality
            )));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConvertError::config(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }

        if !self.no_limit && self.max_dimension == 0 {
            return Err(ConvertError::config(
                "max_dimension must be greater than 0 (use no_limit to disable resizing)",
            ));
        }

        Ok(())
    }

    /// The resize bound in effect, if any
    pub fn resize_bound(&self) -> Option<u32> {
        (!self.no_limit).then_some(self.max_dimension)
    }
}

/// Batch execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of concurrent workers (None = logical CPU count)
    pub workers: Option<usize>,

    /// Descend into subdirectories
    pub recursive: bool,

    /// Per-file time limit in seconds (None = unlimited)
    pub timeout_seconds: Option<u64>,

    /// Copy failed originals into `<root>/errors` after the run
    pub copy_failures: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: None, // Auto-detect
            recursive: false,
            timeout_seconds: None,
            copy_failures: false,
        }
    }
}

impl ProcessingConfig {
    /// Resolved worker count, never zero
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON logging
    pub json_format: bool,

    /// Log file path (None = stderr)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file: None,
        }
    }
}

/// Formats a batch can be converted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TargetFormat {
    Png,
    Jpg,
    Webp,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 3] = [Self::Png, Self::Jpg, Self::Webp];

    /// File extension, also used as the output directory name
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Webp => "webp",
        }
    }
}

impl FromStr for TargetFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "webp" => Ok(Self::Webp),
            other => Err(ConvertError::unsupported_format(other)),
        }
    }
}

impl TryFrom<String> for TargetFormat {
    type Error = ConvertError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ConvertError::config(format!(
                "Failed to read config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        // An unknown target format is reported as such, not as a parse error
        match config_extension(path.as_ref()).as_str() {
            "toml" => {
                let value: toml::Value = toml::from_str(&content)?;
                check_format(
                    value
                        .get("conversion")
                        .and_then(|c| c.get("format"))
                        .and_then(|f| f.as_str()),
                )?;
                value.try_into().map_err(Into::into)
            }
            "yaml" | "yml" => {
                let value: serde_yaml::Value = serde_yaml::from_str(&content)?;
                check_format(
                    value
                        .get("conversion")
                        .and_then(|c| c.get("format"))
                        .and_then(|f| f.as_str()),
                )?;
                serde_yaml::from_value(value).map_err(Into::into)
            }
            _ => Err(ConvertError::config(
                "Unsupported config file format. Use .toml or .yaml",
            )),
        }
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = match config_extension(path.as_ref()).as_str() {
            "toml" => toml::to_string_pretty(self)
                .map_err(|e| ConvertError::config(format!("TOML serialization failed: {}", e)))?,
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map_err(|e| ConvertError::config(format!("YAML serialization failed: {}", e)))?,
            _ => {
                return Err(ConvertError::config(
                    "Unsupported config file format. Use .toml or .yaml",
                ))
            }
        };

        std::fs::write(&path, content).map_err(|e| {
            ConvertError::config(format!(
                "Failed to write config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.conversion.validate()?;

        if self.processing.workers == Some(0) {
            return Err(ConvertError::config("Worker count must be greater than 0"));
        }

        if self.processing.timeout_seconds == Some(0) {
            return Err(ConvertError::config(
                "Timeout must be greater than 0 seconds (omit it to disable)",
            ));
        }

        Ok(())
    }
}

fn check_format(format: Option<&str>) -> Result<()> {
    match format {
        Some(format) => format.parse::<TargetFormat>().map(|_| ()),
        None => Ok(()),
    }
}

fn config_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.conversion.format, TargetFormat::Webp);
        assert_eq!(config.conversion.resize_bound(), Some(1440));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_target_format_parsing() {
        assert_eq!("PNG".parse::<TargetFormat>().unwrap(), TargetFormat::Png);
        assert_eq!("jpeg".parse::<TargetFormat>().unwrap(), TargetFormat::Jpg);
        assert_eq!(" webp ".parse::<TargetFormat>().unwrap(), TargetFormat::Webp);

        let err = "heic".parse::<TargetFormat>().unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat { ref format } if format == "heic"));
    }

    #[test]
    fn test_unknown_format_in_config_file() {
        let dir = TempDir::new().unwrap();
        for (name, content) in [
            ("bad.toml", "[conversion]\nformat = \"tga\"\n"),
            ("bad.yaml", "conversion:\n  format: tga\n"),
        ] {
            let path = dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            let err = Config::from_file(&path).unwrap_err();
            assert!(matches!(err, ConvertError::UnsupportedFormat { ref format } if format == "tga"));
        }

        let path = dir.path().join("alias.toml");
        std::fs::write(&path, "[conversion]\nformat = \"JPEG\"\n").unwrap();
        assert_eq!(Config::from_file(&path).unwrap().conversion.format, TargetFormat::Jpg);
    }

    #[test]
    fn test_quality_bounds() {
        let mut config = Config::default();
        config.conversion.quality = 0;
        assert!(config.validate().is_err());

        // Quality only matters for WebP
        config.conversion.format = TargetFormat::Png;
        assert!(config.validate().is_ok());

        config.conversion.jpeg_quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_no_limit_disables_bound() {
        let conversion = ConversionConfig {
            no_limit: true,
            max_dimension: 0,
            ..Default::default()
        };
        assert!(conversion.validate().is_ok());
        assert_eq!(conversion.resize_bound(), None);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default();
        config.processing.workers = Some(0);
        assert!(config.validate().is_err());
        assert_eq!(ProcessingConfig::default().worker_count(), num_cpus::get().max(1));
    }

    #[test]
    fn test_config_file_io() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.conversion.format = TargetFormat::Jpg;
        config.processing.workers = Some(3);

        let toml_path = dir.path().join("fastconvert.toml");
        config.to_file(&toml_path).unwrap();
        let loaded = Config::from_file(&toml_path).unwrap();
        assert_eq!(loaded.conversion.format, TargetFormat::Jpg);
        assert_eq!(loaded.processing.workers, Some(3));

        let yaml_path = dir.path().join("fastconvert.yaml");
        config.to_file(&yaml_path).unwrap();
        let loaded = Config::from_file(&yaml_path).unwrap();
        assert!(loaded.validate().is_ok());

        assert!(config.to_file(dir.path().join("fastconvert.ini")).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[conversion]\nformat = \"jpeg\"\n").unwrap();
        assert_eq!(config.conversion.format, TargetFormat::Jpg);
        assert_eq!(config.conversion.jpeg_quality, 80);
        assert!(!config.processing.recursive);
    }
}
