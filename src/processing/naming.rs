//! Collision-safe output path allocation
//!
//! One [`NameAllocator`] is shared by every worker in a run. A claim checks the
//! filesystem and the in-memory ledger under the same lock, so two workers can
//! never walk away with the same path. Candidates are `name.ext`, then
//! `name_1.ext`, `name_2.ext`, ... which always terminates.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

/// Ledger of output paths handed out during one run
#[derive(Debug, Default)]
pub struct NameAllocator {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `desired` or the first free disambiguated variant of it
    pub fn claim(&self, desired: &Path) -> PathBuf {
        // A poisoned ledger is still a valid set; keep going.
        let mut claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut suffix: u64 = 0;
        loop {
            let candidate = candidate_path(desired, suffix);
            if !claimed.contains(&candidate) && !exists_on_disk(&candidate) {
                if suffix > 0 {
                    debug!("Output {:?} taken, using {:?}", desired, candidate);
                }
                claimed.insert(candidate.clone());
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Number of paths claimed so far
    pub fn claimed_count(&self) -> usize {
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_claimed(&self, path: &Path) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(path)
    }
}

/// `dir/name.ext` for suffix 0, `dir/name_N.ext` otherwise
fn candidate_path(desired: &Path, suffix: u64) -> PathBuf {
    if suffix == 0 {
        return desired.to_path_buf();
    }

    let stem = desired.file_stem().unwrap_or_default();
    let mut file_name = OsString::from(stem);
    file_name.push(format!("_{}", suffix));
    if let Some(ext) = desired.extension() {
        file_name.push(".");
        file_name.push(ext);
    }
    desired.with_file_name(file_name)
}

fn exists_on_disk(path: &Path) -> bool {
    // symlink_metadata so a dangling link still counts as taken
    std::fs::symlink_metadata(path).is_ok()
}
