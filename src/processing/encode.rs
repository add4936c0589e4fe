//! Target encoding

use std::io::Write;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::{WebPEncoder, WebPQuality};
use image::DynamicImage;

use crate::config::TargetFormat;
use crate::error::FailureReason;

/// Encoder parameters for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub target: TargetFormat,
    /// 1-100, 100 selects lossless
    pub webp_quality: u8,
    /// 1-100
    pub jpeg_quality: u8,
}

/// Encode `image` into `writer` in the target format
pub fn encode_to<W: Write>(
    image: &DynamicImage,
    settings: &EncodeSettings,
    writer: &mut W,
) -> Result<(), FailureReason> {
    match settings.target {
        TargetFormat::Jpg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(writer, settings.jpeg_quality.clamp(1, 100));
            rgb.write_with_encoder(encoder)?;
        }
        TargetFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(writer, CompressionType::Best, PngFilterType::Adaptive);
            image.write_with_encoder(encoder)?;
        }
        TargetFormat::Webp => {
            // Lossy WebP is deprecated upstream pending a pure-Rust encoder:
            // https://github.com/image-rs/image/issues/1984
            #[allow(deprecated)]
            let quality = match settings.webp_quality {
                q if q >= 100 => WebPQuality::lossless(),
                q => WebPQuality::lossy(q.max(1)),
            };
            // libwebp takes 8-bit RGB(A) only
            let pixels = if image.color().has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            #[allow(deprecated)]
            let encoder = WebPEncoder::new_with_quality(writer, quality);
            pixels.write_with_encoder(encoder)?;
        }
    }

    Ok(())
}
