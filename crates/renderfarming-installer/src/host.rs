use std::path::PathBuf;

use renderfarming_core::{Error, Result};

/// The only questions the installer asks of the host application.
pub trait HostEnvironment {
    fn user_scripts_dir(&self) -> Result<PathBuf>;

    fn install_root(&self) -> Result<PathBuf>;
}

/// Host answers fixed up front, from configuration or the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticHost {
    user_scripts_dir: Option<PathBuf>,
    install_root: Option<PathBuf>,
}

impl StaticHost {
    pub fn new(install_root: impl Into<PathBuf>, user_scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_scripts_dir: Some(user_scripts_dir.into()),
            install_root: Some(install_root.into()),
        }
    }

    pub fn from_parts(install_root: Option<PathBuf>, user_scripts_dir: Option<PathBuf>) -> Self {
        Self {
            user_scripts_dir,
            install_root,
        }
    }
}

impl HostEnvironment for StaticHost {
    fn user_scripts_dir(&self) -> Result<PathBuf> {
        answer("user_scripts_dir", self.user_scripts_dir.as_ref())
    }

    fn install_root(&self) -> Result<PathBuf> {
        answer("install_root", self.install_root.as_ref())
    }
}

fn answer(query: &str, value: Option<&PathBuf>) -> Result<PathBuf> {
    let Some(path) = value else {
        return Err(Error::Host {
            query: query.to_string(),
            message: "not configured".to_string(),
        });
    };
    if !path.is_absolute() {
        return Err(Error::Host {
            query: query.to_string(),
            message: format!("expected an absolute path, got {}", path.display()),
        });
    }
    Ok(path.clone())
}
