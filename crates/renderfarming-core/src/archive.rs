use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, IoContext, Result};

/// Read-only, addressable container of named file entries the installer
/// ships its payload in.
pub trait PayloadArchive: Send + Sync {
    /// Short human-readable description (the archive path).
    fn describe(&self) -> String;

    fn entry_exists(&self, name: &str) -> bool;

    fn read_entry_lines(&self, name: &str) -> Result<Vec<String>>;

    fn extract_all(&self, dst: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Directory,
    Zip,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Zip => "zip",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "dir" | "directory" => Some(Self::Directory),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    pub fn infer_from_path(path: &Path) -> Option<Self> {
        if path.is_dir() {
            return Some(Self::Directory);
        }
        let lower = path.to_string_lossy().to_ascii_lowercase();
        if lower.ends_with(".zip") || lower.ends_with(".rfpkg") {
            return Some(Self::Zip);
        }
        None
    }

    pub fn open(self, path: impl Into<PathBuf>) -> Box<dyn PayloadArchive> {
        match self {
            Self::Directory => Box::new(DirectoryPayload::new(path)),
            Self::Zip => Box::new(ZipPayload::new(path)),
        }
    }
}

/// Opens `path` with the payload implementation its shape implies.
pub fn open_payload(path: &Path) -> Result<Box<dyn PayloadArchive>> {
    let kind = PayloadKind::infer_from_path(path).ok_or_else(|| Error::Archive {
        context: format!("failed to open payload {}", path.display()),
        message: "expected a directory or a .zip archive".to_string(),
    })?;
    Ok(kind.open(path))
}

/// An already unpacked payload folder.
#[derive(Debug, Clone)]
pub struct DirectoryPayload {
    root: PathBuf,
}

impl DirectoryPayload {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf> {
        let relative = safe_entry_path(name).ok_or_else(|| Error::ArchiveEntryNotFound {
            entry: name.to_string(),
        })?;
        Ok(self.root.join(relative))
    }
}

impl PayloadArchive for DirectoryPayload {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn entry_exists(&self, name: &str) -> bool {
        self.entry_path(name).map(|path| path.is_file()).unwrap_or(false)
    }

    fn read_entry_lines(&self, name: &str) -> Result<Vec<String>> {
        let path = self.entry_path(name)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ArchiveEntryNotFound {
                    entry: name.to_string(),
                });
            }
            Err(err) => {
                return Err(Error::io(
                    format!("failed to read payload entry {}", path.display()),
                    err,
                ));
            }
        };
        Ok(raw.lines().map(str::to_string).collect())
    }

    fn extract_all(&self, dst: &Path) -> Result<()> {
        if !self.root.is_dir() {
            return Err(Error::Archive {
                context: format!("failed to extract payload {}", self.root.display()),
                message: "payload directory does not exist".to_string(),
            });
        }
        copy_dir_recursive(&self.root, dst)
    }
}

/// A zip payload. The archive is reopened per call so the value stays
/// `Send + Sync` without interior locking.
#[derive(Debug, Clone)]
pub struct ZipPayload {
    path: PathBuf,
}

impl ZipPayload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> Result<zip::ZipArchive<fs::File>> {
        let file = fs::File::open(&self.path)
            .io_context(|| format!("failed to open payload archive {}", self.path.display()))?;
        zip::ZipArchive::new(file).map_err(|err| Error::Archive {
            context: format!("failed to read payload archive {}", self.path.display()),
            message: err.to_string(),
        })
    }
}

impl PayloadArchive for ZipPayload {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn entry_exists(&self, name: &str) -> bool {
        match self.open() {
            Ok(mut archive) => archive.by_name(name).is_ok(),
            Err(_) => false,
        }
    }

    fn read_entry_lines(&self, name: &str) -> Result<Vec<String>> {
        let mut archive = self.open()?;
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(Error::ArchiveEntryNotFound {
                    entry: name.to_string(),
                });
            }
            Err(err) => {
                return Err(Error::Archive {
                    context: format!("failed to open entry '{name}' in {}", self.path.display()),
                    message: err.to_string(),
                });
            }
        };
        let mut raw = String::new();
        entry
            .read_to_string(&mut raw)
            .io_context(|| format!("failed to read entry '{name}' in {}", self.path.display()))?;
        Ok(raw.lines().map(str::to_string).collect())
    }

    fn extract_all(&self, dst: &Path) -> Result<()> {
        let mut archive = self.open()?;
        fs::create_dir_all(dst).io_context(|| format!("failed to create {}", dst.display()))?;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|err| Error::Archive {
                context: format!("failed to read entry #{index} in {}", self.path.display()),
                message: err.to_string(),
            })?;
            let Some(relative) = entry.enclosed_name() else {
                continue;
            };

            let out_path = dst.join(relative);
            if entry.is_dir() {
                fs::create_dir_all(&out_path)
                    .io_context(|| format!("failed to create {}", out_path.display()))?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)
                    .io_context(|| format!("failed to create {}", parent.display()))?;
            }
            let mut out_file = fs::File::create(&out_path)
                .io_context(|| format!("failed to create {}", out_path.display()))?;
            io::copy(&mut entry, &mut out_file)
                .io_context(|| format!("failed to extract {}", out_path.display()))?;
        }

        Ok(())
    }
}

fn safe_entry_path(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name.replace('\\', "/"));
    if path.as_os_str().is_empty() {
        return None;
    }
    if path
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    Some(path)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).io_context(|| format!("failed to create {}", dst.display()))?;
    for entry in fs::read_dir(src).io_context(|| format!("failed to read {}", src.display()))? {
        let entry = entry.io_context(|| format!("failed to read {}", src.display()))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .io_context(|| format!("failed to stat {}", src_path.display()))?;
        if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
            continue;
        }
        fs::copy(&src_path, &dst_path).io_context(|| {
            format!(
                "failed to copy {} -> {}",
                src_path.display(),
                dst_path.display()
            )
        })?;
    }
    Ok(())
}
