use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::item::{normalize_path, InstallerItem};
use crate::manifest::{split_data_line, strip_quotes, Manifest};
use crate::tokens::{is_token, TokenTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePolicy {
    /// A missing source aborts translation (install payloads).
    Require,
    /// A missing source is passed through; callers skip it later.
    AllowMissing,
}

/// Turns raw `"src"|"dst"` data lines into [`InstallerItem`]s.
#[derive(Debug, Clone, Copy)]
pub struct ManifestTranslator<'a> {
    tokens: &'a TokenTable,
    staging_root: Option<&'a Path>,
    source_policy: SourcePolicy,
}

impl<'a> ManifestTranslator<'a> {
    pub fn new(tokens: &'a TokenTable) -> Self {
        Self {
            tokens,
            staging_root: None,
            source_policy: SourcePolicy::Require,
        }
    }

    /// Root relative sources resolve against (the extracted payload).
    pub fn with_staging_root(mut self, root: &'a Path) -> Self {
        self.staging_root = Some(root);
        self
    }

    pub fn with_source_policy(mut self, policy: SourcePolicy) -> Self {
        self.source_policy = policy;
        self
    }

    /// Translates every data line in order. Any failure discards the whole
    /// list.
    pub fn translate(&self, manifest: &Manifest) -> Result<Vec<InstallerItem>> {
        manifest
            .data_entries()
            .map(|(line_number, line)| self.translate_line(line_number, line))
            .collect()
    }

    pub fn translate_line(&self, line_number: usize, line: &str) -> Result<InstallerItem> {
        let (raw_source, raw_destination) = split_data_line(line_number, line)?;
        let source = self.resolve_source(strip_quotes(&raw_source));
        let source_exists = source.exists();
        if !source_exists && self.source_policy == SourcePolicy::Require {
            return Err(Error::MissingSource {
                line: line_number,
                content: line.to_string(),
                path: source,
            });
        }

        let destination_field = strip_quotes(&raw_destination);
        if destination_field.is_empty() {
            return Ok(InstallerItem::new(&source, PathBuf::new(), source.is_dir()));
        }

        let destination_dir = if is_token(destination_field) {
            self.tokens
                .resolve(destination_field)
                .map(Path::to_path_buf)
                .ok_or_else(|| Error::UnknownToken {
                    token: destination_field.to_string(),
                    line: line_number,
                    content: line.to_string(),
                })?
        } else {
            PathBuf::from(normalize_path(destination_field))
        };

        let destination = match source.file_name() {
            Some(file_name) => destination_dir.join(file_name),
            None => destination_dir,
        };
        Ok(InstallerItem::new(&source, destination, source.is_dir()))
    }

    fn resolve_source(&self, field: &str) -> PathBuf {
        let source = PathBuf::from(normalize_path(field));
        if source.has_root() || source.is_absolute() {
            return source;
        }
        match self.staging_root {
            Some(root) => root.join(source),
            None => source,
        }
    }
}
