//! Source format detection and handling

use std::path::Path;

use crate::error::FailureReason;

/// Extensions picked up by discovery (compared case-insensitively)
pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "heic", "heif", "gif", "tiff", "bmp",
];

/// Formats we know how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Tiff,
    Bmp,
    Heif,
}

impl SourceFormat {
    /// Map a file extension onto a source format
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            "tiff" | "tif" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            "heic" | "heif" => Some(Self::Heif),
            _ => None,
        }
    }

    /// Detect from a path's extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, FailureReason> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        Self::from_extension(extension).ok_or_else(|| {
            FailureReason::unsupported_input(if extension.is_empty() {
                "(no extension)"
            } else {
                extension
            })
        })
    }

    /// Detect from magic bytes
    pub fn sniff(data: &[u8]) -> Option<Self> {
        let kind = infer::get(data)?;
        match kind.mime_type() {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            "image/tiff" => Some(Self::Tiff),
            "image/bmp" => Some(Self::Bmp),
            "image/heif" | "image/heif-sequence" | "image/heic" | "image/heic-sequence" => {
                Some(Self::Heif)
            }
            _ => None,
        }
    }

    /// Pick the decoder: content wins over a mislabelled extension
    pub fn resolve(path: &Path, data: &[u8]) -> Result<Self, FailureReason> {
        let by_extension = Self::from_path(path)?;
        Ok(match Self::sniff(data) {
            Some(sniffed) if sniffed != by_extension => {
                tracing::debug!(
                    "{:?} is labelled {:?} but looks like {:?}",
                    path,
                    by_extension,
                    sniffed
                );
                sniffed
            }
            _ => by_extension,
        })
    }

    /// Matching `image` crate format, if `image` can decode it
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Png => Some(image::ImageFormat::Png),
            Self::WebP => Some(image::ImageFormat::WebP),
            Self::Gif => Some(image::ImageFormat::Gif),
            Self::Tiff => Some(image::ImageFormat::Tiff),
            Self::Bmp => Some(image::ImageFormat::Bmp),
            Self::Heif => None,
        }
    }
}

/// Check if a file extension is eligible for conversion
pub fn is_supported_input_extension(extension: &str) -> bool {
    SUPPORTED_INPUT_EXTENSIONS
        .iter()
        .any(|&ext| ext.eq_ignore_ascii_case(extension))
}

/// Check a path's extension against the allow-list
pub fn is_supported_input_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, is_supported_input_extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection_from_path() {
        assert_eq!(SourceFormat::from_path("test.jpg").unwrap(), SourceFormat::Jpeg);
        assert_eq!(SourceFormat::from_path("test.PNG").unwrap(), SourceFormat::Png);
        assert_eq!(SourceFormat::from_path("IMG_0001.HEIC").unwrap(), SourceFormat::Heif);
        assert!(matches!(
            SourceFormat::from_path("notes.txt"),
            Err(FailureReason::UnsupportedInput { .. })
        ));
        assert!(SourceFormat::from_path("Makefile").is_err());
    }

    #[test]
    fn test_sniff_magic_bytes() {
        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D];
        assert_eq!(SourceFormat::sniff(&png_header), Some(SourceFormat::Png));

        let jpeg_header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01];
        assert_eq!(SourceFormat::sniff(&jpeg_header), Some(SourceFormat::Jpeg));

        assert_eq!(SourceFormat::sniff(b"definitely not an image"), None);
    }

    #[test]
    fn test_resolve_prefers_content() {
        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D];
        let resolved = SourceFormat::resolve(Path::new("mislabelled.jpg"), &png_header).unwrap();
        assert_eq!(resolved, SourceFormat::Png);

        let resolved = SourceFormat::resolve(Path::new("garbage.jpg"), b"garbage").unwrap();
        assert_eq!(resolved, SourceFormat::Jpeg);
    }

    #[test]
    fn test_supported_extensions() {
        for ext in ["jpg", "JPEG", "png", "webp", "heic", "HEIF", "gif", "tiff", "bmp"] {
            assert!(is_supported_input_extension(ext), "{ext}");
        }
        assert!(!is_supported_input_extension("txt"));
        assert!(!is_supported_input_extension("tif"));
        assert!(is_supported_input_path("dir/a.Png"));
        assert!(!is_supported_input_path("dir/c.txt"));
    }
}
