//! Single-file conversion

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::{ConversionConfig, TargetFormat};
use crate::error::FailureReason;

pub mod decode;
pub mod encode;
pub mod formats;
pub mod naming;
pub mod resize;

pub use encode::EncodeSettings;
pub use formats::*;
pub use naming::NameAllocator;
pub use resize::ResizeBound;

/// Everything a converter needs besides the input path. Shared by all
/// workers of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub target: TargetFormat,
    pub output_dir: PathBuf,
    pub options: EncodeOptions,
}

/// Codec knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub webp_quality: u8,
    pub jpeg_quality: u8,
    /// `None` keeps the source dimensions
    pub resize: Option<ResizeBound>,
}

impl ConversionRequest {
    /// Build a request from the conversion section of the config
    pub fn from_config(config: &ConversionConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            target: config.format,
            output_dir: output_dir.into(),
            options: EncodeOptions {
                webp_quality: config.quality,
                jpeg_quality: config.jpeg_quality,
                resize: config.resize_bound().map(ResizeBound::new),
            },
        }
    }

    /// `output_dir/<input stem>.<target ext>`, before disambiguation
    pub fn desired_output_path(&self, input: &Path) -> Result<PathBuf, FailureReason> {
        let stem = input
            .file_stem()
            .ok_or_else(|| FailureReason::unsupported_input("(no file name)"))?;
        // keep dotted stems such as `photo.final` intact
        let mut file_name = stem.to_os_string();
        file_name.push(".");
        file_name.push(self.target.extension());
        Ok(self.output_dir.join(file_name))
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            target: self.target,
            webp_quality: self.options.webp_quality,
            jpeg_quality: self.options.jpeg_quality,
        }
    }
}

/// Converts one file. Implementations must report every problem as a
/// [`FailureReason`]; panics are contained by the worker pool but still
/// count as a failure.
pub trait Converter: Send + Sync {
    fn convert(&self, input: &Path, request: &ConversionRequest) -> Result<PathBuf, FailureReason>;
}

/// Default converter backed by the `image` crate
#[derive(Debug, Clone)]
pub struct ImageConverter {
    names: Arc<NameAllocator>,
}

impl ImageConverter {
    pub fn new(names: Arc<NameAllocator>) -> Self {
        Self { names }
    }
}

impl Converter for ImageConverter {
    fn convert(&self, input: &Path, request: &ConversionRequest) -> Result<PathBuf, FailureReason> {
        let start_time = Instant::now();
        debug!("Converting {:?} to {}", input, request.target);

        let image = decode::load_source(input)?;
        let image = match request.options.resize {
            Some(bound) => bound.apply(image),
            None => image,
        };

        let desired = request.desired_output_path(input)?;
        let settings = request.encode_settings();

        loop {
            let output = self.names.claim(&desired);
            let written = write_output(&output, |writer| {
                encode::encode_to(&image, &settings, writer)
            });

            match written {
                Ok(()) => {
                    debug!(
                        "Converted {:?} -> {:?} in {:.2}ms",
                        input,
                        output,
                        start_time.elapsed().as_secs_f64() * 1000.0
                    );
                    return Ok(output);
                }
                // Someone outside this run created the file after our claim;
                // the next claim sees it on disk and moves past it.
                Err(WriteError::AlreadyExists) => {
                    warn!("Output {:?} appeared after it was claimed, retrying", output);
                }
                Err(WriteError::Failed(reason)) => return Err(reason),
            }
        }
    }
}

enum WriteError {
    AlreadyExists,
    Failed(FailureReason),
}

impl From<FailureReason> for WriteError {
    fn from(reason: FailureReason) -> Self {
        Self::Failed(reason)
    }
}

impl From<io::Error> for WriteError {
    fn from(err: io::Error) -> Self {
        Self::Failed(FailureReason::from_io(&err))
    }
}

/// Removes a created output file on drop unless committed
struct PartialOutput<'a> {
    path: &'a Path,
    committed: bool,
}

impl<'a> PartialOutput<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialOutput<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = std::fs::remove_file(self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove partial output {:?}: {}", self.path, e);
            }
        }
    }
}

fn write_output<F>(path: &Path, encode: F) -> Result<(), WriteError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), FailureReason>,
{
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(WriteError::AlreadyExists),
        Err(e) => return Err(e.into()),
    };
    let guard = PartialOutput::new(path);

    let mut writer = BufWriter::new(file);
    encode(&mut writer)?;
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| FailureReason::from_io(e.error()))?;
    file.sync_all()?;

    guard.commit();
    Ok(())
}
