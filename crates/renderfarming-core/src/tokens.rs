use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const TOKEN_MAIN: &str = "$(main)";
pub const TOKEN_MACRO: &str = "$(macro)";
pub const TOKEN_STARTUP: &str = "$(startup)";
pub const TOKEN_DARK_ICONS: &str = "$(dark_icons)";
pub const TOKEN_LIGHT_ICONS: &str = "$(light_icons)";

pub const KNOWN_TOKENS: [&str; 5] = [
    TOKEN_MAIN,
    TOKEN_MACRO,
    TOKEN_STARTUP,
    TOKEN_DARK_ICONS,
    TOKEN_LIGHT_ICONS,
];

pub const TOKEN_PREFIX: char = '$';

/// Symbolic destination token to absolute directory. Built once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTable {
    entries: BTreeMap<String, PathBuf>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.insert(token, dir);
        self
    }

    pub fn insert(&mut self, token: impl Into<String>, dir: impl Into<PathBuf>) {
        self.entries.insert(token.into(), dir.into());
    }

    pub fn resolve(&self, token: &str) -> Option<&Path> {
        self.entries.get(token).map(PathBuf::as_path)
    }

    pub fn tokens(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(token, dir)| (token.as_str(), dir.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn is_token(field: &str) -> bool {
    field.starts_with(TOKEN_PREFIX)
}
