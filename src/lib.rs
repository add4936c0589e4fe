//! FastConvert - Parallel Batch Image Converter
//!
//! Converts every image in a directory tree to PNG, JPEG or WebP using a
//! bounded pool of workers. A single bad file never stops a batch: each file
//! ends up as exactly one success or one typed failure in the run summary.
//!
//! # Features
//!
//! - **Parallel Processing**: fixed worker pool, one slot per conversion
//! - **Collision-Safe Output**: `photo.jpg`, `photo_1.jpg`, ... never clobbers
//! - **Failure Isolation**: decode errors, I/O errors, panics and timeouts are per file
//! - **Graceful Stop**: in-flight files finish, the run is reported incomplete
//! - **Format Support**: JPEG, PNG, WebP, GIF, TIFF, BMP in; HEIC with the `heif` feature
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fastconvert::{BatchConverter, Config, NoopObserver, StopSignal, TargetFormat};
//!
//! # async fn run() -> fastconvert::Result<()> {
//! let mut config = Config::default();
//! config.conversion.format = TargetFormat::Jpg;
//!
//! let batch = BatchConverter::new("photos", config)?;
//! let summary = batch.run(Arc::new(NoopObserver), &StopSignal::new()).await?;
//!
//! println!("{} converted, {} failed", summary.success_count, summary.failure_count);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod failures;
pub mod parallel;
pub mod pipeline;
pub mod processing;

// Re-export commonly used types
pub use config::{Config, ConversionConfig, LoggingConfig, ProcessingConfig, TargetFormat, WebpPreset};
pub use discovery::{discover, DiscoveryOptions, FileTask};
pub use error::{ConvertError, FailureReason, Result};
pub use failures::{copy_failed_files, FailureCopyReport};
pub use parallel::{
    ChannelObserver, ConversionOutcome, NoopObserver, ProcessSummary, ProgressBarObserver,
    ProgressEvent, ProgressObserver, StopSignal, WorkerPool,
};
pub use pipeline::BatchConverter;
pub use processing::{ConversionRequest, Converter, EncodeOptions, ImageConverter, NameAllocator};

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::{info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging from `RUST_LOG` and check the host
///
/// Safe to call more than once; only the first subscriber is installed.
pub fn init() -> Result<()> {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .finish(),
    )
    .is_ok()
    {
        info!("FastConvert v{} initialized", VERSION);
    }

    validate_system_requirements()
}

/// Initialize with an explicit logging configuration
pub fn init_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| {
        ConvertError::config(format!("Invalid log level '{}': {}", config.level, e))
    })?;

    let writer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(config.file.is_none());

    let installed = if config.json_format {
        tracing::subscriber::set_global_default(builder.json().finish()).is_ok()
    } else {
        tracing::subscriber::set_global_default(builder.finish()).is_ok()
    };
    if installed {
        info!("FastConvert v{} initialized with custom config", VERSION);
    }

    validate_system_requirements()
}

fn validate_system_requirements() -> Result<()> {
    use sysinfo::{System, SystemExt};

    let mut system = System::new();
    system.refresh_memory();

    const MIN_MEMORY_MB: u64 = 512;
    let available_memory = system.available_memory();
    if available_memory < MIN_MEMORY_MB * 1024 * 1024 {
        warn!(
            "Low available memory: {}MB (recommended: >{}MB)",
            available_memory / (1024 * 1024),
            MIN_MEMORY_MB
        );
    }

    info!("Detected {} logical CPUs", num_cpus::get());
    info!(
        "Decoders: JPEG {}, PNG {}, WebP {}, HEIF {}",
        image::ImageFormat::Jpeg.can_read(),
        image::ImageFormat::Png.can_read(),
        image::ImageFormat::WebP.can_read(),
        cfg!(feature = "heif")
    );

    Ok(())
}
