use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use renderfarming_core::{Error, InstallerItem, IoContext, Result};
use tracing::{debug, warn};

use crate::layout::ProtectedDirs;

pub const DEFAULT_RECURSION_LIMIT: usize = 130;

/// Outcome of a deletion request. `Skipped` is the soft refusal for paths
/// outside the protected set or directories that still hold foreign files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Absent,
    Skipped,
}

/// Creates `path` and any missing ancestors one directory at a time,
/// appending each directory actually created to `record` (outermost first).
/// Nothing is recorded for directories that already exist, and nothing is
/// created when the ancestor chain is deeper than `limit`.
pub fn create_dir_recorded(
    path: &Path,
    limit: usize,
    record: &mut Vec<InstallerItem>,
) -> Result<usize> {
    let mut created = Vec::new();
    create_dir_step(path, path, 0, limit, &mut created)?;
    for dir in &created {
        debug!(path = %dir.display(), "created directory");
    }
    let count = created.len();
    record.extend(created.into_iter().map(InstallerItem::directory));
    Ok(count)
}

fn create_dir_step(
    current: &Path,
    original: &Path,
    depth: usize,
    limit: usize,
    created: &mut Vec<PathBuf>,
) -> Result<()> {
    if current.is_dir() {
        return Ok(());
    }
    if depth >= limit {
        return Err(Error::RecursionLimit {
            current: current.to_path_buf(),
            original: original.to_path_buf(),
            limit,
        });
    }

    match fs::create_dir(current) {
        Ok(()) => {
            created.push(current.to_path_buf());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists && current.is_dir() => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let Some(parent) = current
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
            else {
                return Err(Error::io(
                    format!("failed to create directory {}", current.display()),
                    err,
                ));
            };
            create_dir_step(parent, original, depth + 1, limit, created)?;
            match fs::create_dir(current) {
                Ok(()) => {
                    created.push(current.to_path_buf());
                    Ok(())
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists && current.is_dir() => {
                    Ok(())
                }
                Err(err) => Err(Error::io(
                    format!("failed to create directory {}", current.display()),
                    err,
                )),
            }
        }
        Err(err) => Err(Error::io(
            format!("failed to create directory {}", current.display()),
            err,
        )),
    }
}

/// Lists the directories [`create_dir_recorded`] would create for `path`,
/// treating anything in `assume_removed` as already gone.
pub fn missing_ancestors(path: &Path, assume_removed: &[PathBuf]) -> Vec<PathBuf> {
    let mut missing = Vec::new();
    let mut current = Some(path);
    while let Some(dir) = current.filter(|dir| !dir.as_os_str().is_empty()) {
        let removed = assume_removed.iter().any(|entry| entry == dir);
        if dir.is_dir() && !removed {
            break;
        }
        missing.push(dir.to_path_buf());
        current = dir.parent();
    }
    missing.reverse();
    missing
}

/// Deletes a regular file whose containing directory is protected.
pub fn delete_file_protected(path: &Path, protected: &ProtectedDirs) -> Result<DeleteOutcome> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(DeleteOutcome::Absent),
        Err(err) => {
            return Err(Error::io(
                format!("failed to stat {}", path.display()),
                err,
            ));
        }
    };
    if metadata.is_dir() {
        return Ok(DeleteOutcome::Skipped);
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    if !protected.contains(parent) {
        warn!(path = %path.display(), "refusing to delete file outside protected directories");
        return Ok(DeleteOutcome::Skipped);
    }

    fs::remove_file(path).io_context(|| format!("failed to delete file {}", path.display()))?;
    debug!(path = %path.display(), "deleted file");
    Ok(DeleteOutcome::Deleted)
}

/// Deletes a protected directory once it holds no files. Protected, file-free
/// subdirectories are removed with it; any remaining file or unprotected
/// subdirectory keeps the directory (and its ancestors in this call) in place.
pub fn delete_dir_protected(
    path: &Path,
    protected: &ProtectedDirs,
    limit: usize,
) -> Result<DeleteOutcome> {
    delete_dir_step(path, path, 0, limit, protected)
}

fn delete_dir_step(
    current: &Path,
    original: &Path,
    depth: usize,
    limit: usize,
    protected: &ProtectedDirs,
) -> Result<DeleteOutcome> {
    if depth >= limit {
        return Err(Error::RecursionLimit {
            current: current.to_path_buf(),
            original: original.to_path_buf(),
            limit,
        });
    }

    let metadata = match fs::symlink_metadata(current) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(DeleteOutcome::Absent),
        Err(err) => {
            return Err(Error::io(
                format!("failed to stat {}", current.display()),
                err,
            ));
        }
    };
    if !metadata.is_dir() {
        return Ok(DeleteOutcome::Skipped);
    }
    if !protected.contains(current) {
        warn!(path = %current.display(), "refusing to delete directory outside protected directories");
        return Ok(DeleteOutcome::Skipped);
    }

    let mut retained = false;
    let entries =
        fs::read_dir(current).io_context(|| format!("failed to read {}", current.display()))?;
    for entry in entries {
        let entry = entry.io_context(|| format!("failed to read {}", current.display()))?;
        let child = entry.path();
        let file_type = entry
            .file_type()
            .io_context(|| format!("failed to stat {}", child.display()))?;
        if !file_type.is_dir() {
            debug!(path = %child.display(), "untracked file keeps directory");
            retained = true;
            continue;
        }
        if delete_dir_step(&child, original, depth + 1, limit, protected)?
            == DeleteOutcome::Skipped
        {
            retained = true;
        }
    }

    if retained {
        debug!(path = %current.display(), "directory retained");
        return Ok(DeleteOutcome::Skipped);
    }

    fs::remove_dir(current)
        .io_context(|| format!("failed to delete directory {}", current.display()))?;
    debug!(path = %current.display(), "deleted directory");
    Ok(DeleteOutcome::Deleted)
}

/// Removes compiled artifacts left next to `source`: `<stem>.<ext>` beside it
/// and `__pycache__/<stem>.*.<ext>`. Returns how many were deleted.
pub fn delete_compiled_siblings(
    source: &Path,
    extension: &str,
    protected: &ProtectedDirs,
) -> Result<usize> {
    let (Some(parent), Some(stem)) = (source.parent(), source.file_stem()) else {
        return Ok(0);
    };
    if source
        .extension()
        .is_some_and(|current| current.eq_ignore_ascii_case(extension))
    {
        return Ok(0);
    }

    let mut deleted = 0;
    let sibling = source.with_extension(extension);
    if delete_file_protected(&sibling, protected)? == DeleteOutcome::Deleted {
        deleted += 1;
    }

    let cache_dir = parent.join("__pycache__");
    if !cache_dir.is_dir() {
        return Ok(deleted);
    }
    let prefix = format!("{}.", stem.to_string_lossy());
    let suffix = format!(".{extension}");
    let entries =
        fs::read_dir(&cache_dir).io_context(|| format!("failed to read {}", cache_dir.display()))?;
    for entry in entries {
        let entry = entry.io_context(|| format!("failed to read {}", cache_dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix)
            && name.ends_with(&suffix)
            && delete_file_protected(&entry.path(), protected)? == DeleteOutcome::Deleted
        {
            deleted += 1;
        }
    }
    Ok(deleted)
}

pub fn remove_temp_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(Error::io(
            format!("failed to delete temp directory {}", path.display()),
            err,
        )),
    }
}
