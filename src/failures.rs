//! Copying failed originals aside for inspection

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::parallel::ProcessSummary;
use crate::processing::NameAllocator;

/// Directory under the input root that receives failed originals
pub const ERRORS_DIR_NAME: &str = "errors";

/// What happened to each failed original
#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureCopyReport {
    pub copied: Vec<CopiedFile>,
    pub errors: Vec<CopyError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopiedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyError {
    pub path: PathBuf,
    pub message: String,
}

impl FailureCopyReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Copy every failed input of `summary` into `errors_dir`.
///
/// Names that collide (same file name from different subdirectories, or a
/// leftover from an earlier run) get a numeric suffix. The directory is only
/// created when there is something to copy.
pub fn copy_failed_files(summary: &ProcessSummary, errors_dir: &Path) -> Result<FailureCopyReport> {
    if summary.failures.is_empty() {
        return Ok(FailureCopyReport::default());
    }

    std::fs::create_dir_all(errors_dir)?;
    let names = NameAllocator::new();

    let results: Vec<std::result::Result<CopiedFile, CopyError>> = summary
        .failed_paths()
        .collect::<Vec<_>>()
        .par_iter()
        .map(|source| {
            let Some(file_name) = source.file_name() else {
                return Err(CopyError {
                    path: source.to_path_buf(),
                    message: "path has no file name".to_string(),
                });
            };

            let destination = names.claim(&errors_dir.join(file_name));
            std::fs::copy(source, &destination)
                .map(|_| CopiedFile {
                    source: source.to_path_buf(),
                    destination,
                })
                .map_err(|e| {
                    warn!("Failed to copy {:?} into {:?}: {}", source, errors_dir, e);
                    CopyError {
                        path: source.to_path_buf(),
                        message: e.to_string(),
                    }
                })
        })
        .collect();

    let mut report = FailureCopyReport::default();
    for result in results {
        match result {
            Ok(copied) => report.copied.push(copied),
            Err(error) => report.errors.push(error),
        }
    }

    info!(
        "Copied {} failed files to {:?} ({} errors)",
        report.copied.len(),
        errors_dir,
        report.errors.len()
    );
    Ok(report)
}
