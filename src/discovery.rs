//! Input file discovery

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{ConvertError, Result};
use crate::processing::is_supported_input_path;

/// One file queued for conversion
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileTask {
    path: PathBuf,
}

impl FileTask {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Discovery settings
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Descend into subdirectories
    pub recursive: bool,
    /// Directories never entered (our own output folders)
    pub exclude_dirs: Vec<PathBuf>,
}

impl DiscoveryOptions {
    pub fn new(recursive: bool) -> Self {
        Self {
            recursive,
            exclude_dirs: Vec::new(),
        }
    }

    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude_dirs.push(dir.into());
        self
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude_dirs.iter().any(|dir| dir == path)
    }
}

/// Collect every eligible file under `root`, in walk order.
///
/// Only a missing or unreadable root is an error. Symlinks are not followed
/// into directories; a link that looks like an image becomes a task of its
/// own, so a dangling one fails as a single file. Unreadable subdirectories
/// are logged and skipped.
pub fn discover(root: &Path, options: &DiscoveryOptions) -> Result<Vec<FileTask>> {
    let root = root
        .canonicalize()
        .map_err(|e| ConvertError::discovery(root, e))?;

    if !root.is_dir() {
        return Err(ConvertError::discovery(
            &root,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }
    std::fs::read_dir(&root).map_err(|e| ConvertError::discovery(&root, e))?;

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && options.is_excluded(entry.path())));

    let mut tasks = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(walk_error(&root, e)),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !is_candidate(&entry) {
            continue;
        }
        if is_supported_input_path(entry.path()) {
            tasks.push(FileTask::new(entry.into_path()));
        } else {
            debug!("Skipping unsupported file: {:?}", entry.path());
        }
    }

    info!("Discovered {} files under {:?}", tasks.len(), root);
    Ok(tasks)
}

/// Regular files, and links that do not resolve to a directory
fn is_candidate(entry: &walkdir::DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return true;
    }
    if !file_type.is_symlink() {
        return false;
    }
    match std::fs::metadata(entry.path()) {
        Ok(target) => !target.is_dir(),
        Err(e) => {
            warn!("Broken link {:?}: {}", entry.path(), e);
            true
        }
    }
}

fn walk_error(root: &Path, err: walkdir::Error) -> ConvertError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop detected"));
    ConvertError::discovery(path, source)
}
