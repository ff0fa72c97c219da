use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::PayloadArchive;
use crate::error::{Error, IoContext, Result};
use crate::item::InstallerItem;

pub const HEADER_MARKER: char = '#';
pub const FIELD_SEPARATOR: char = '|';
pub const VERSION_KEY: &str = "version";
pub const UNKNOWN_VERSION: &str = "UNKNOWN";

/// Backing store a [`Manifest`] reads from and, for plain files, writes to.
#[derive(Clone)]
pub enum ManifestBinding {
    File(PathBuf),
    ArchiveEntry {
        archive: Arc<dyn PayloadArchive>,
        entry: String,
    },
}

impl fmt::Debug for ManifestBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::ArchiveEntry { archive, entry } => f
                .debug_struct("ArchiveEntry")
                .field("archive", &archive.describe())
                .field("entry", entry)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Manifest {
    binding: ManifestBinding,
    header: Vec<String>,
    data: Vec<String>,
    /// 1-based line each data entry occupies in the backing store.
    data_line_numbers: Vec<usize>,
}

impl Manifest {
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        Self {
            binding: ManifestBinding::File(path.into()),
            header: Vec::new(),
            data: Vec::new(),
            data_line_numbers: Vec::new(),
        }
    }

    pub fn for_archive_entry(archive: Arc<dyn PayloadArchive>, entry: impl Into<String>) -> Self {
        Self {
            binding: ManifestBinding::ArchiveEntry {
                archive,
                entry: entry.into(),
            },
            header: Vec::new(),
            data: Vec::new(),
            data_line_numbers: Vec::new(),
        }
    }

    pub fn binding(&self) -> &ManifestBinding {
        &self.binding
    }

    /// Backing file path; `None` for archive-bound manifests.
    pub fn path(&self) -> Option<&Path> {
        match &self.binding {
            ManifestBinding::File(path) => Some(path),
            ManifestBinding::ArchiveEntry { .. } => None,
        }
    }

    pub fn header_lines(&self) -> &[String] {
        &self.header
    }

    pub fn data(&self) -> &[String] {
        &self.data
    }

    /// Data lines paired with their 1-based line numbers. Entries read from
    /// disk keep the line they were read from even when header lines follow
    /// them; entries set in memory are numbered in render order.
    pub fn data_entries(&self) -> impl Iterator<Item = (usize, &str)> {
        self.data_line_numbers
            .iter()
            .copied()
            .zip(self.data.iter().map(String::as_str))
    }

    pub fn header(&self) -> Result<ManifestHeader> {
        ManifestHeader::from_lines(&self.header)
    }

    /// Loads and validates the backing store, replacing any in-memory content.
    pub fn read(&mut self) -> Result<()> {
        let lines = self.load_lines()?;
        let sections = split_sections(&lines)?;
        self.header = sections.header;
        self.data = sections.data;
        self.data_line_numbers = sections.data_line_numbers;
        Ok(())
    }

    /// Serializes header then data, replacing the target file in one rename.
    pub fn write(&self) -> Result<()> {
        let path = match &self.binding {
            ManifestBinding::File(path) => path,
            ManifestBinding::ArchiveEntry { entry, .. } => {
                return Err(Error::ReadOnlyBinding {
                    entry: entry.clone(),
                });
            }
        };

        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        if !parent.is_dir() {
            return Err(Error::DestinationDirMissing {
                path: parent.to_path_buf(),
            });
        }

        let staging = staging_path(path);
        fs::write(&staging, self.render().as_bytes())
            .io_context(|| format!("failed to write manifest {}", staging.display()))?;
        if let Err(err) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(Error::io(
                format!("failed to replace manifest {}", path.display()),
                err,
            ));
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut payload = String::new();
        for line in self.header.iter().chain(self.data.iter()) {
            payload.push_str(line);
            payload.push('\n');
        }
        payload
    }

    pub fn set_header(&mut self, header: &ManifestHeader) {
        self.header = header.to_lines();
        self.renumber_data();
    }

    pub fn set_data(&mut self, items: &[InstallerItem]) {
        self.data = items
            .iter()
            .map(|item| {
                format_data_line(&item.normalized_source(), &item.normalized_destination())
            })
            .collect();
        self.renumber_data();
    }

    /// Appends a line naming this manifest's own file so that uninstalling
    /// removes it along with everything it lists.
    pub fn add_self(&mut self) -> Result<()> {
        let path = match &self.binding {
            ManifestBinding::File(path) => path.clone(),
            ManifestBinding::ArchiveEntry { entry, .. } => {
                return Err(Error::ReadOnlyBinding {
                    entry: entry.clone(),
                });
            }
        };
        let item = InstallerItem::file(&path, PathBuf::new());
        self.data
            .push(format_data_line(&item.normalized_source(), ""));
        self.renumber_data();
        Ok(())
    }

    fn renumber_data(&mut self) {
        let first = self.header.len() + 1;
        self.data_line_numbers = (first..first + self.data.len()).collect();
    }

    fn load_lines(&self) -> Result<Vec<String>> {
        match &self.binding {
            ManifestBinding::File(path) => match fs::read_to_string(path) {
                Ok(raw) => Ok(raw.lines().map(str::to_string).collect()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    Err(Error::ManifestNotFound { path: path.clone() })
                }
                Err(err) => Err(Error::io(
                    format!("failed to read manifest {}", path.display()),
                    err,
                )),
            },
            ManifestBinding::ArchiveEntry { archive, entry } => archive.read_entry_lines(entry),
        }
    }
}

/// `key -> value` view over the header section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestHeader {
    entries: BTreeMap<String, String>,
}

impl ManifestHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(lines: &[String]) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (index, line) in lines.iter().enumerate() {
            let (key, value) = parse_header_line(index + 1, line)?;
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn version(&self) -> &str {
        self.get(VERSION_KEY).unwrap_or(UNKNOWN_VERSION)
    }

    fn to_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(key, value)| format!("{HEADER_MARKER}{key}{FIELD_SEPARATOR}{value}"))
            .collect()
    }
}

/// Splits a data line into its two fields, quotes left intact.
pub fn split_data_line(line_number: usize, line: &str) -> Result<(String, String)> {
    split_two(line_number, line, line)
}

pub fn strip_quotes(field: &str) -> &str {
    let trimmed = field.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
}

fn format_data_line(source: &str, destination: &str) -> String {
    format!("\"{source}\"{FIELD_SEPARATOR}\"{destination}\"")
}

struct Sections {
    header: Vec<String>,
    data: Vec<String>,
    data_line_numbers: Vec<usize>,
}

fn split_sections(lines: &[String]) -> Result<Sections> {
    let last_content = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |index| index + 1);

    let mut sections = Sections {
        header: Vec::new(),
        data: Vec::new(),
        data_line_numbers: Vec::new(),
    };
    for (index, raw) in lines[..last_content].iter().enumerate() {
        let line_number = index + 1;
        let mut line = raw.trim_end_matches(['\r', '\n']);
        if index == 0 {
            line = line.trim_start_matches('\u{feff}');
        }

        if line.starts_with(HEADER_MARKER) {
            parse_header_line(line_number, line)?;
            sections.header.push(line.to_string());
        } else {
            split_data_line(line_number, line)?;
            sections.data.push(line.to_string());
            sections.data_line_numbers.push(line_number);
        }
    }
    Ok(sections)
}

fn parse_header_line(line_number: usize, line: &str) -> Result<(String, String)> {
    let body = line.strip_prefix(HEADER_MARKER).unwrap_or(line);
    split_two(line_number, body, line)
}

fn split_two(line_number: usize, body: &str, original: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = body.split(FIELD_SEPARATOR).collect();
    match parts.as_slice() {
        [first, second] => Ok(((*first).to_string(), (*second).to_string())),
        _ => Err(Error::MalformedLine {
            line: line_number,
            content: original.to_string(),
            parts: parts.iter().map(|part| (*part).to_string()).collect(),
        }),
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
