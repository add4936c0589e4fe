//! Error types and handling for FastConvert
//!
//! Two families live here. [`ConvertError`] is for run-level problems that stop
//! a batch before it starts (bad configuration, unreadable root). [`FailureReason`]
//! describes why a single file could not be converted; it never escapes the
//! pipeline as an error and is only reported through the run summary.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for FastConvert operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Main error type for FastConvert operations
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Root directory missing or unreadable
    #[error("Discovery failed under {root:?}: {source}")]
    Discovery {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Requested target format is not one we can write
    #[error("Unsupported target format: {format} (supported: png, jpg, webp)")]
    UnsupportedFormat { format: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O related errors outside of per-file processing
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serde(String),

    /// System resource errors
    #[error("System resource error: {message}")]
    System { message: String },
}

impl ConvertError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new unsupported target format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a new discovery error for `root`
    pub fn discovery(root: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Discovery {
            root: root.into(),
            source,
        }
    }

    /// Create a new system error
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Discovery { root, source } if source.kind() == io::ErrorKind::NotFound => {
                format!("Input directory does not exist: {}", root.display())
            }
            Self::Discovery { root, source } => {
                format!("Cannot read input directory {}: {}", root.display(), source)
            }
            Self::UnsupportedFormat { format } => {
                format!("'{}' is not a supported output format. Choose one of: png, jpg, webp", format)
            }
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for ConvertError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serde(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for ConvertError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serde(format!("YAML parsing error: {}", err))
    }
}

/// Why a single file failed to convert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Source extension or content is not something we can decode
    UnsupportedInput { format: String },
    /// Source could not be decoded (corrupt or truncated image)
    Decode { message: String },
    /// Encoder rejected the image or failed mid-write
    Encode { message: String },
    /// Filesystem problem: unreadable source, permission, disk full
    Io { category: IoCategory, message: String },
    /// Conversion exceeded the per-file time limit
    Timeout { seconds: u64 },
    /// Converter panicked; contained to this file
    Panicked { message: String },
}

/// Coarse classification of filesystem failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoCategory {
    NotFound,
    PermissionDenied,
    StorageFull,
    Other,
}

impl FailureReason {
    pub fn unsupported_input<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedInput {
            format: format.into(),
        }
    }

    pub fn decode(message: impl fmt::Display) -> Self {
        Self::Decode {
            message: message.to_string(),
        }
    }

    pub fn encode(message: impl fmt::Display) -> Self {
        Self::Encode {
            message: message.to_string(),
        }
    }

    /// Classify an I/O error
    pub fn from_io(err: &io::Error) -> Self {
        let category = match err.kind() {
            io::ErrorKind::NotFound => IoCategory::NotFound,
            io::ErrorKind::PermissionDenied => IoCategory::PermissionDenied,
            // ENOSPC / EDQUOT; ErrorKind::StorageFull is not stable on our MSRV
            _ if matches!(err.raw_os_error(), Some(28) | Some(122)) => IoCategory::StorageFull,
            _ => IoCategory::Other,
        };
        Self::Io {
            category,
            message: err.to_string(),
        }
    }

    /// Short stable label, used in logs and JSON output
    pub fn label(&self) -> &'static str {
        match self {
            Self::UnsupportedInput { .. } => "unsupported_input",
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::Io { .. } => "io",
            Self::Timeout { .. } => "timeout",
            Self::Panicked { .. } => "panicked",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedInput { format } => write!(f, "unsupported input format: {}", format),
            Self::Decode { message } => write!(f, "decode failed: {}", message),
            Self::Encode { message } => write!(f, "encode failed: {}", message),
            Self::Io { category, message } => write!(f, "I/O error ({:?}): {}", category, message),
            Self::Timeout { seconds } => write!(f, "timed out after {}s", seconds),
            Self::Panicked { message } => write!(f, "converter panicked: {}", message),
        }
    }
}

impl From<io::Error> for FailureReason {
    fn from(err: io::Error) -> Self {
        Self::from_io(&err)
    }
}

impl From<image::ImageError> for FailureReason {
    fn from(err: image::ImageError) -> Self {
        use image::ImageError;

        match err {
            ImageError::Decoding(e) => Self::decode(e),
            ImageError::Encoding(e) => Self::encode(e),
            ImageError::Unsupported(e) => Self::unsupported_input(e.to_string()),
            // Decoders read from memory, so running dry means a truncated file
            ImageError::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => Self::decode(e),
            ImageError::IoError(e) => Self::from_io(&e),
            ImageError::Limits(e) => Self::decode(e),
            ImageError::Parameter(e) => Self::encode(e),
        }
    }
}
