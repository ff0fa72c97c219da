use std::sync::Arc;

use renderfarming_core::{Manifest, PayloadArchive, Result};

use crate::layout::{DirectoryLocator, INSTALL_MANIFEST};
use crate::orchestrator::Mode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStatus {
    pub installed_version: Option<String>,
    pub payload_version: Option<String>,
    pub recommended: Mode,
}

/// Version recorded in the current uninstall manifest, `None` when the
/// package is not installed.
pub fn installed_version(locator: &DirectoryLocator) -> Result<Option<String>> {
    let path = locator.uninstall_manifest_path();
    if !path.is_file() {
        return Ok(None);
    }
    let mut manifest = Manifest::for_file(path);
    manifest.read()?;
    Ok(Some(manifest.header()?.version().to_string()))
}

/// Reads the payload's install manifest in place, without extracting.
pub fn payload_version(payload: Arc<dyn PayloadArchive>) -> Result<String> {
    let mut manifest = Manifest::for_archive_entry(payload, INSTALL_MANIFEST);
    manifest.read()?;
    Ok(manifest.header()?.version().to_string())
}

pub fn inspect(
    locator: &DirectoryLocator,
    payload: Option<Arc<dyn PayloadArchive>>,
) -> Result<InstallStatus> {
    let installed = installed_version(locator)?;
    let payload_version = payload.map(payload_version).transpose()?;
    Ok(InstallStatus {
        recommended: Mode::recommended(installed.as_deref()),
        installed_version: installed,
        payload_version,
    })
}
