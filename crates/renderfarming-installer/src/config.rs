use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::fs_ops::DEFAULT_RECURSION_LIMIT;
use crate::host::StaticHost;
use crate::layout::{DirectoryLocator, DEFAULT_PACKAGE_MARKER};
use crate::orchestrator::RunSettings;

pub const INSTALL_ROOT_ENV: &str = "RF_INSTALL_ROOT";
pub const USER_SCRIPTS_ENV: &str = "RF_USER_SCRIPTS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    pub install_root: Option<PathBuf>,
    pub user_scripts_dir: Option<PathBuf>,
    pub temp_root: Option<PathBuf>,
    pub package_marker: String,
    pub recursion_limit: usize,
    pub manifest_read_attempts: u32,
    pub compiled_extension: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            install_root: None,
            user_scripts_dir: None,
            temp_root: None,
            package_marker: DEFAULT_PACKAGE_MARKER.to_string(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            manifest_read_attempts: 3,
            compiled_extension: "pyc".to_string(),
        }
    }
}

impl InstallerConfig {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse installer config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.recursion_limit == 0 {
            return Err(anyhow!("recursion_limit must be at least 1"));
        }
        if self.manifest_read_attempts == 0 {
            return Err(anyhow!("manifest_read_attempts must be at least 1"));
        }
        let marker = self.package_marker.trim();
        if marker.is_empty() || marker.contains(['/', '\\']) {
            return Err(anyhow!(
                "package_marker '{}' must be a single non-empty path segment",
                self.package_marker
            ));
        }
        let extension = self.compiled_extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(anyhow!("compiled_extension must not be empty"));
        }
        Ok(())
    }

    /// Fills host paths still unset from `RF_INSTALL_ROOT` and
    /// `RF_USER_SCRIPTS`.
    pub fn with_env_fallback(self) -> Self {
        self.with_fallback_from(|key| std::env::var_os(key).map(PathBuf::from))
    }

    pub fn with_fallback_from(mut self, lookup: impl Fn(&str) -> Option<PathBuf>) -> Self {
        if self.install_root.is_none() {
            self.install_root = lookup(INSTALL_ROOT_ENV);
        }
        if self.user_scripts_dir.is_none() {
            self.user_scripts_dir = lookup(USER_SCRIPTS_ENV);
        }
        self
    }

    pub fn host(&self) -> StaticHost {
        StaticHost::from_parts(self.install_root.clone(), self.user_scripts_dir.clone())
    }

    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn locator(&self) -> renderfarming_core::Result<DirectoryLocator> {
        Ok(DirectoryLocator::from_host(&self.host(), self.temp_root())?
            .with_marker(self.package_marker.trim()))
    }

    pub fn settings(&self) -> RunSettings {
        RunSettings {
            recursion_limit: self.recursion_limit,
            manifest_read_attempts: self.manifest_read_attempts,
            compiled_extension: self.compiled_extension.trim_start_matches('.').to_string(),
            retry_backoff: Duration::from_millis(100),
        }
    }
}
