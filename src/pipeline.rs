//! Whole-run orchestration: discover, convert, summarize

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::Config;
use crate::discovery::{self, DiscoveryOptions, FileTask};
use crate::error::{ConvertError, Result};
use crate::failures::{self, FailureCopyReport, ERRORS_DIR_NAME};
use crate::parallel::{ProcessSummary, ProgressObserver, StopSignal, WorkerPool};
use crate::processing::{ConversionRequest, Converter, ImageConverter, NameAllocator};

/// Converts every image under one root directory
#[derive(Debug, Clone)]
pub struct BatchConverter {
    root: PathBuf,
    config: Config,
}

impl BatchConverter {
    /// Validate `config` and resolve `root`. Fails before any work is done.
    pub fn new(root: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate()?;

        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| ConvertError::discovery(root, e))?;

        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `<root>/<target extension>`
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(self.config.conversion.format.extension())
    }

    /// `<root>/errors`
    pub fn errors_dir(&self) -> PathBuf {
        self.root.join(ERRORS_DIR_NAME)
    }

    /// Files this run would convert. Our own output folders are skipped.
    pub fn discover(&self) -> Result<Vec<FileTask>> {
        let options = DiscoveryOptions::new(self.config.processing.recursive)
            .exclude(self.output_dir())
            .exclude(self.errors_dir());
        discovery::discover(&self.root, &options)
    }

    pub fn request(&self) -> ConversionRequest {
        ConversionRequest::from_config(&self.config.conversion, self.output_dir())
    }

    /// Run with the built-in image converter
    pub async fn run(
        &self,
        observer: Arc<dyn ProgressObserver>,
        stop: &StopSignal,
    ) -> Result<ProcessSummary> {
        let converter = ImageConverter::new(Arc::new(NameAllocator::new()));
        self.run_with_converter(Arc::new(converter), observer, stop)
            .await
    }

    /// Run with any converter
    pub async fn run_with_converter(
        &self,
        converter: Arc<dyn Converter>,
        observer: Arc<dyn ProgressObserver>,
        stop: &StopSignal,
    ) -> Result<ProcessSummary> {
        let tasks = self.discover()?;
        let output_dir = self.output_dir();

        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            ConvertError::system(format!(
                "Failed to create output directory {}: {}",
                output_dir.display(),
                e
            ))
        })?;

        info!(
            "Converting {} files from {:?} into {:?} as {}",
            tasks.len(),
            self.root,
            output_dir,
            self.config.conversion.format
        );

        let pool = WorkerPool::new(self.config.processing.worker_count())?
            .with_file_timeout(self.config.processing.timeout_seconds.map(Duration::from_secs));

        let summary = pool
            .run(tasks, converter, Arc::new(self.request()), observer, stop)
            .await;
        Ok(summary)
    }

    /// Copy the failed originals of `summary` into [`errors_dir`](Self::errors_dir)
    pub fn copy_failures(&self, summary: &ProcessSummary) -> Result<FailureCopyReport> {
        failures::copy_failed_files(summary, &self.errors_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetFormat;
    use tempfile::TempDir;

    #[test]
    fn test_output_dirs_follow_target() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.conversion.format = TargetFormat::Jpg;

        let batch = BatchConverter::new(dir.path(), config).unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(batch.output_dir(), root.join("jpg"));
        assert_eq!(batch.errors_dir(), root.join("errors"));
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.processing.workers = Some(0);
        assert!(matches!(
            BatchConverter::new(dir.path(), config),
            Err(ConvertError::Config { .. })
        ));
    }

    #[test]
    fn test_missing_root_is_discovery_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            BatchConverter::new(dir.path().join("nope"), Config::default()),
            Err(ConvertError::Discovery { .. })
        ));
    }

    #[test]
    fn test_discovery_skips_previous_outputs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.png"), b"").unwrap();
        std::fs::create_dir(dir.path().join("webp")).unwrap();
        std::fs::write(dir.path().join("webp/a.webp"), b"").unwrap();
        std::fs::create_dir(dir.path().join("errors")).unwrap();
        std::fs::write(dir.path().join("errors/b.png"), b"").unwrap();

        let mut config = Config::default();
        config.processing.recursive = true;
        let batch = BatchConverter::new(dir.path(), config).unwrap();

        let tasks = batch.discover().unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].path().ends_with("a.png"));
    }
}
