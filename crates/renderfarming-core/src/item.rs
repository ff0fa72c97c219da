use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// One resolved manifest entry. `destination` is empty for entries that only
/// name something to remove (audit records and the self reference).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerItem {
    source: PathBuf,
    destination: PathBuf,
    is_directory: bool,
}

impl InstallerItem {
    pub fn new(source: impl AsRef<Path>, destination: impl AsRef<Path>, is_directory: bool) -> Self {
        Self {
            source: PathBuf::from(normalize_path(&source.as_ref().to_string_lossy())),
            destination: PathBuf::from(normalize_path(&destination.as_ref().to_string_lossy())),
            is_directory,
        }
    }

    pub fn file(source: impl AsRef<Path>, destination: impl AsRef<Path>) -> Self {
        Self::new(source, destination, false)
    }

    pub fn directory(path: impl AsRef<Path>) -> Self {
        Self::new(path, PathBuf::new(), true)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn normalized_source(&self) -> String {
        self.source.to_string_lossy().into_owned()
    }

    pub fn normalized_destination(&self) -> String {
        self.destination.to_string_lossy().into_owned()
    }

    /// Directory the destination file lands in.
    pub fn destination_dir(&self) -> Option<&Path> {
        self.destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
    }
}

/// Rewrites both separator styles to the platform separator, collapses
/// repeated separators and drops trailing ones (a bare root is kept). A
/// leading double separator is a UNC prefix and stays doubled.
pub fn normalize_path(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut previous_was_separator = false;
    let mut chars = raw.chars().peekable();
    if raw.starts_with(is_separator) && raw[1..].starts_with(is_separator) {
        normalized.push(MAIN_SEPARATOR);
        normalized.push(MAIN_SEPARATOR);
        while chars.next_if(|ch| is_separator(*ch)).is_some() {}
        previous_was_separator = true;
    }
    for ch in chars {
        if is_separator(ch) {
            if !previous_was_separator {
                normalized.push(MAIN_SEPARATOR);
            }
            previous_was_separator = true;
        } else {
            normalized.push(ch);
            previous_was_separator = false;
        }
    }

    while normalized.len() > 1 && normalized.ends_with(MAIN_SEPARATOR) {
        if is_drive_root(&normalized) {
            break;
        }
        normalized.pop();
    }
    normalized
}

fn is_separator(ch: char) -> bool {
    ch == '/' || ch == '\\'
}

fn is_drive_root(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
