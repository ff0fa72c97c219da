mod cleanup;
mod config;
mod events;
mod fs_ops;
mod host;
mod layout;
mod orchestrator;
mod status;

pub use cleanup::CleanupPlan;
pub use config::{InstallerConfig, INSTALL_ROOT_ENV, USER_SCRIPTS_ENV};
pub use events::{EventSink, NullSink, ProgressEvent, RecordingSink};
pub use fs_ops::{
    create_dir_recorded, delete_compiled_siblings, delete_dir_protected, delete_file_protected,
    missing_ancestors, remove_temp_tree, DeleteOutcome, DEFAULT_RECURSION_LIMIT,
};
pub use host::{HostEnvironment, StaticHost};
pub use layout::{
    generate_run_id, DirectoryLocator, ProtectedDirs, DEFAULT_PACKAGE_MARKER, INSTALL_MANIFEST,
    UNINSTALL_MANIFEST,
};
pub use orchestrator::{
    spawn_run, InstallOrchestrator, Mode, RunHandle, RunReport, RunSettings, RunState,
};
pub use status::{inspect, installed_version, payload_version, InstallStatus};

#[cfg(test)]
mod tests;
