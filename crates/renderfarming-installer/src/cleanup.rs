use std::fs;
use std::path::PathBuf;

use renderfarming_core::{IoContext, Result};

use crate::layout::DirectoryLocator;

/// Files carrying the package marker in the package's own top-level
/// directories, plus those directories in the order they should be tried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupPlan {
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
}

impl CleanupPlan {
    /// Log and config sit inside the install directory, so they go first.
    pub fn discover(locator: &DirectoryLocator) -> Result<Self> {
        let marker = locator.marker();
        let mut plan = Self::default();
        for dir in [
            locator.log_dir(),
            locator.config_dir(),
            locator.install_dir(),
        ] {
            if !dir.is_dir() {
                continue;
            }
            let entries =
                fs::read_dir(&dir).io_context(|| format!("failed to read {}", dir.display()))?;
            let mut matching = Vec::new();
            for entry in entries {
                let entry = entry.io_context(|| format!("failed to read {}", dir.display()))?;
                let is_file = entry
                    .file_type()
                    .io_context(|| format!("failed to stat {}", entry.path().display()))?
                    .is_file();
                if is_file && entry.file_name().to_string_lossy().contains(marker) {
                    matching.push(entry.path());
                }
            }
            matching.sort();
            plan.files.extend(matching);
            plan.dirs.push(dir);
        }
        Ok(plan)
    }

    pub fn units(&self) -> u64 {
        (self.files.len() + self.dirs.len()) as u64
    }
}
