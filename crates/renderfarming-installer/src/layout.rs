use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use renderfarming_core::{
    normalize_path, Result, TokenTable, TOKEN_DARK_ICONS, TOKEN_LIGHT_ICONS, TOKEN_MACRO,
    TOKEN_MAIN, TOKEN_STARTUP,
};
use sha2::{Digest, Sha256};

use crate::host::HostEnvironment;

pub const INSTALL_MANIFEST: &str = "install.man";
pub const UNINSTALL_MANIFEST: &str = "uninstall.man";
pub const DEFAULT_PACKAGE_MARKER: &str = "RenderFarming";

/// Every location the installer touches, derived from the two host answers
/// and a temp root. Holds no other state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLocator {
    install_root: PathBuf,
    user_scripts: PathBuf,
    temp_root: PathBuf,
    marker: String,
    run_id: String,
}

impl DirectoryLocator {
    pub fn new(
        install_root: impl Into<PathBuf>,
        user_scripts: impl Into<PathBuf>,
        temp_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            install_root: install_root.into(),
            user_scripts: user_scripts.into(),
            temp_root: temp_root.into(),
            marker: DEFAULT_PACKAGE_MARKER.to_string(),
            run_id: generate_run_id(),
        }
    }

    pub fn from_host(host: &dyn HostEnvironment, temp_root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(
            host.install_root()?,
            host.user_scripts_dir()?,
            temp_root,
        ))
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn user_scripts(&self) -> &Path {
        &self.user_scripts
    }

    pub fn install_dir(&self) -> PathBuf {
        self.user_scripts.join(&self.marker)
    }

    pub fn macros_dir(&self) -> PathBuf {
        self.install_root.join("MacroScripts").join(&self.marker)
    }

    pub fn startup_dir(&self) -> PathBuf {
        self.user_scripts.join("startup")
    }

    pub fn icons_dir(&self) -> PathBuf {
        self.install_root.join("UI_ln").join("Icons")
    }

    pub fn dark_icons_dir(&self) -> PathBuf {
        self.icons_dir().join("Dark").join(&self.marker)
    }

    pub fn light_icons_dir(&self) -> PathBuf {
        self.icons_dir().join("Light").join(&self.marker)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.install_dir().join("config")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.install_dir().join("logs")
    }

    pub fn temp_parent(&self) -> PathBuf {
        self.temp_root.join(&self.marker)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_parent().join(&self.run_id)
    }

    pub fn staged_install_manifest_path(&self) -> PathBuf {
        self.temp_dir().join(INSTALL_MANIFEST)
    }

    pub fn uninstall_manifest_path(&self) -> PathBuf {
        self.install_dir().join(UNINSTALL_MANIFEST)
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.log_dir().join(format!("{}_setup.log", self.marker))
    }

    pub fn token_table(&self) -> TokenTable {
        TokenTable::new()
            .with(TOKEN_MAIN, self.install_dir())
            .with(TOKEN_MACRO, self.macros_dir())
            .with(TOKEN_STARTUP, self.startup_dir())
            .with(TOKEN_DARK_ICONS, self.dark_icons_dir())
            .with(TOKEN_LIGHT_ICONS, self.light_icons_dir())
    }

    /// Directories the package owns outright. The temp parent, the temp root
    /// and both host roots are deliberately absent.
    pub fn protected_dirs(&self) -> ProtectedDirs {
        ProtectedDirs::new([
            self.install_dir(),
            self.macros_dir(),
            self.startup_dir(),
            self.dark_icons_dir(),
            self.light_icons_dir(),
            self.config_dir(),
            self.log_dir(),
            self.temp_dir(),
        ])
    }

    /// Labelled listing for diagnostics output.
    pub fn named_dirs(&self) -> Vec<(&'static str, PathBuf)> {
        vec![
            ("install", self.install_dir()),
            ("macros", self.macros_dir()),
            ("startup", self.startup_dir()),
            ("dark_icons", self.dark_icons_dir()),
            ("light_icons", self.light_icons_dir()),
            ("config", self.config_dir()),
            ("log", self.log_dir()),
            ("temp", self.temp_dir()),
        ]
    }
}

/// Allow-list of directories deletion may touch, together with their
/// descendants. Containment is by whole path segments, so `/a/b` does not
/// cover `/a/bc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedDirs {
    dirs: BTreeSet<PathBuf>,
}

impl ProtectedDirs {
    pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            dirs: dirs
                .into_iter()
                .map(|dir| normalized(&dir))
                .filter(|dir| dir.components().count() > 1)
                .collect(),
        }
    }

    pub fn contains(&self, candidate: &Path) -> bool {
        if candidate
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::CurDir))
        {
            return false;
        }
        let candidate = normalized(candidate);
        self.dirs.iter().any(|dir| candidate.starts_with(dir))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

fn normalized(path: &Path) -> PathBuf {
    PathBuf::from(normalize_path(&path.to_string_lossy()))
}

/// 16 hex chars of SHA-256 over a nanosecond timestamp and the process id.
pub fn generate_run_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
