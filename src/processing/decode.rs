//! Source loading and decoding

use std::fs::File;
use std::path::Path;

use image::DynamicImage;
use memmap2::Mmap;
use tracing::debug;

use crate::error::FailureReason;
use crate::processing::formats::SourceFormat;

/// Files above this size are memory-mapped instead of read into a buffer
pub const MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Owned bytes or a mapping, whichever was cheaper to get
enum SourceBytes {
    Buffered(Vec<u8>),
    Mapped(Mmap),
}

impl std::ops::Deref for SourceBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Buffered(data) => data,
            Self::Mapped(map) => map,
        }
    }
}

fn read_source(path: &Path) -> Result<SourceBytes, FailureReason> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();

    if size > MMAP_THRESHOLD {
        debug!("Using memory mapping for large file: {:?} ({} bytes)", path, size);
        // SAFETY: the mapping is read-only and dropped before this call's caller
        // returns; a concurrent external truncation surfaces as a decode error.
        let map = unsafe { Mmap::map(&file)? };
        return Ok(SourceBytes::Mapped(map));
    }

    Ok(SourceBytes::Buffered(std::fs::read(path)?))
}

/// Load and decode the image at `path`
pub fn load_source(path: &Path) -> Result<DynamicImage, FailureReason> {
    let data = read_source(path)?;
    if data.is_empty() {
        return Err(FailureReason::decode("file is empty"));
    }

    let format = SourceFormat::resolve(path, &data)?;
    let image = match format.image_format() {
        Some(image_format) => image::load_from_memory_with_format(&data, image_format)?,
        None => decode_heif(&data)?,
    };

    debug!(
        "Decoded {:?} as {:?}: {}x{}",
        path,
        format,
        image.width(),
        image.height()
    );
    Ok(image)
}

#[cfg(feature = "heif")]
fn decode_heif(data: &[u8]) -> Result<DynamicImage, FailureReason> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data).map_err(FailureReason::decode)?;
    let handle = ctx.primary_image_handle().map_err(FailureReason::decode)?;

    let has_alpha = handle.has_alpha_channel();
    let (chroma, channels) = if has_alpha {
        (RgbChroma::Rgba, 4)
    } else {
        (RgbChroma::Rgb, 3)
    };

    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(chroma), None)
        .map_err(FailureReason::decode)?;
    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| FailureReason::decode("HEIF image has no interleaved plane"))?;

    // Rows may be padded out to `stride`
    let width = plane.width;
    let height = plane.height;
    let row_len = width as usize * channels;
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in plane.data.chunks(plane.stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }

    let image = if has_alpha {
        image::RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8)
    } else {
        image::RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
    };
    image.ok_or_else(|| FailureReason::decode("HEIF plane size does not match its dimensions"))
}

#[cfg(not(feature = "heif"))]
fn decode_heif(_data: &[u8]) -> Result<DynamicImage, FailureReason> {
    Err(FailureReason::unsupported_input(
        "heif (built without the `heif` feature)",
    ))
}
