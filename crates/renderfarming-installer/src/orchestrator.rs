use std::any::Any;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use renderfarming_core::{
    Error, InstallerItem, IoContext, Manifest, ManifestHeader, ManifestTranslator,
    PayloadArchive, Result, SourcePolicy,
};
use tracing::{debug, error, info, warn};

use crate::cleanup::CleanupPlan;
use crate::events::{EventSink, NullSink, ProgressEvent};
use crate::fs_ops::{
    create_dir_recorded, delete_compiled_siblings, delete_dir_protected, delete_file_protected,
    missing_ancestors, remove_temp_tree, DeleteOutcome, DEFAULT_RECURSION_LIMIT,
};
use crate::layout::DirectoryLocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Install,
    Upgrade,
    Uninstall,
    Cleanup,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::Uninstall => "uninstall",
            Self::Cleanup => "cleanup",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "install" => Some(Self::Install),
            "upgrade" => Some(Self::Upgrade),
            "uninstall" => Some(Self::Uninstall),
            "cleanup" => Some(Self::Cleanup),
            _ => None,
        }
    }

    /// What a front-end should offer given the currently installed version.
    pub fn recommended(installed_version: Option<&str>) -> Self {
        match installed_version {
            Some(_) => Self::Upgrade,
            None => Self::Install,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Install => "Install",
            Self::Upgrade => "Upgrade",
            Self::Uninstall => "Uninstall",
            Self::Cleanup => "Cleanup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Preparing,
    Installing,
    Uninstalling,
    CleaningUp,
    Complete,
    Error,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub recursion_limit: usize,
    pub manifest_read_attempts: u32,
    pub compiled_extension: String,
    pub retry_backoff: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            manifest_read_attempts: 3,
            compiled_extension: "pyc".to_string(),
            retry_backoff: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub mode: Mode,
    pub states: Vec<RunState>,
    pub previous_version: Option<String>,
    pub installed_version: Option<String>,
    pub dirs_created: usize,
    pub files_copied: usize,
    pub files_deleted: usize,
    pub dirs_deleted: usize,
    pub retained: Vec<PathBuf>,
    pub uninstall_manifest: Option<PathBuf>,
}

impl RunReport {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            states: vec![RunState::Idle],
            previous_version: None,
            installed_version: None,
            dirs_created: 0,
            files_copied: 0,
            files_deleted: 0,
            dirs_deleted: 0,
            retained: Vec::new(),
            uninstall_manifest: None,
        }
    }
}

struct InstallPlan {
    header: ManifestHeader,
    items: Vec<InstallerItem>,
    planned_dirs: usize,
}

impl InstallPlan {
    fn units(&self) -> u64 {
        (self.items.len() + self.planned_dirs) as u64
    }
}

struct UninstallPlan {
    version: String,
    items: Vec<InstallerItem>,
}

/// Drives one install, upgrade, uninstall or cleanup run. A value runs at
/// most once: [`InstallOrchestrator::run`] consumes it.
pub struct InstallOrchestrator {
    locator: DirectoryLocator,
    payload: Option<Arc<dyn PayloadArchive>>,
    settings: RunSettings,
    sink: Box<dyn EventSink>,
    state: RunState,
}

impl InstallOrchestrator {
    pub fn new(locator: DirectoryLocator, settings: RunSettings) -> Self {
        Self {
            locator,
            payload: None,
            settings,
            sink: Box::new(NullSink),
            state: RunState::Idle,
        }
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn set_payload(&mut self, payload: Arc<dyn PayloadArchive>) {
        self.payload = Some(payload);
    }

    pub fn locator(&self) -> &DirectoryLocator {
        &self.locator
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn installed_version(&self) -> Result<Option<String>> {
        crate::status::installed_version(&self.locator)
    }

    /// Runs `mode` to completion on the current thread. Exactly one of
    /// `Complete` or `Error` is emitted; on failure the disk is left as is
    /// apart from this run's temp directory.
    pub fn run(mut self, mode: Mode) -> Result<RunReport> {
        let mut report = RunReport::new(mode);
        info!(mode = mode.as_str(), run_id = self.locator.run_id(), "starting run");
        self.transition(RunState::Preparing, &mut report);

        match self.execute(mode, &mut report) {
            Ok(()) => {
                self.transition(RunState::Complete, &mut report);
                info!(
                    mode = mode.as_str(),
                    files_copied = report.files_copied,
                    dirs_created = report.dirs_created,
                    files_deleted = report.files_deleted,
                    dirs_deleted = report.dirs_deleted,
                    retained = report.retained.len(),
                    "run complete"
                );
                self.sink.emit(ProgressEvent::Complete);
                Ok(report)
            }
            Err(err) => {
                let message = format!("{} failed: {err}", mode.title());
                error!(mode = mode.as_str(), "{message}");
                self.discard_temp();
                self.transition(RunState::Error, &mut report);
                self.sink.emit(ProgressEvent::Error(message));
                Err(err)
            }
        }
    }

    /// Moves the run onto a dedicated worker thread. Events go to the
    /// returned handle, replacing any sink set earlier.
    pub fn spawn(mut self, mode: Mode) -> Result<RunHandle> {
        let (sender, events) = mpsc::channel();
        self.sink = Box::new(sender);
        let worker = thread::Builder::new()
            .name("rf-setup-worker".to_string())
            .spawn(move || self.run(mode))
            .io_context(|| "failed to start installer worker")?;
        Ok(RunHandle {
            events,
            worker,
            finished: false,
        })
    }

    fn execute(&mut self, mode: Mode, report: &mut RunReport) -> Result<()> {
        match mode {
            Mode::Install => {
                let plan = self.prepare_install(&[])?;
                self.tasks_total(plan.units());
                self.transition(RunState::Installing, report);
                self.install_items(&plan, report)?;
                self.transition(RunState::CleaningUp, report);
                self.discard_temp();
            }
            Mode::Uninstall => {
                let plan = self.prepare_uninstall()?;
                report.previous_version = Some(plan.version.clone());
                self.tasks_total(plan.items.len() as u64);
                self.transition(RunState::Uninstalling, report);
                self.uninstall_items(&plan.items, report)?;
                self.transition(RunState::CleaningUp, report);
            }
            Mode::Upgrade => {
                let previous = if self.locator.uninstall_manifest_path().is_file() {
                    Some(self.prepare_uninstall()?)
                } else {
                    info!("nothing installed; upgrade proceeds as a fresh install");
                    None
                };
                let removed_dirs: Vec<PathBuf> = previous
                    .iter()
                    .flat_map(|plan| plan.items.iter())
                    .filter(|item| item.is_directory())
                    .map(|item| item.source().to_path_buf())
                    .collect();
                // The payload is validated before anything is removed.
                let plan = self.prepare_install(&removed_dirs)?;
                let uninstall_units = previous.as_ref().map_or(0, |p| p.items.len() as u64);
                self.tasks_total(uninstall_units + plan.units());

                if let Some(previous) = previous {
                    report.previous_version = Some(previous.version.clone());
                    self.transition(RunState::Uninstalling, report);
                    self.uninstall_items(&previous.items, report)?;
                }
                self.transition(RunState::Installing, report);
                self.install_items(&plan, report)?;
                self.transition(RunState::CleaningUp, report);
                self.discard_temp();
            }
            Mode::Cleanup => {
                let plan = CleanupPlan::discover(&self.locator)?;
                self.tasks_total(plan.units());
                self.transition(RunState::CleaningUp, report);
                self.cleanup(&plan, report)?;
            }
        }
        Ok(())
    }

    fn prepare_install(&mut self, assume_removed: &[PathBuf]) -> Result<InstallPlan> {
        let payload = self.payload.clone().ok_or_else(|| Error::Archive {
            context: "cannot install".to_string(),
            message: "no payload archive was provided".to_string(),
        })?;
        let staging = self.locator.temp_dir();
        info!(payload = %payload.describe(), staging = %staging.display(), "extracting payload");
        payload.extract_all(&staging)?;

        let mut manifest = Manifest::for_file(self.locator.staged_install_manifest_path());
        self.read_with_retry(&mut manifest)?;
        let header = manifest.header()?;
        let tokens = self.locator.token_table();
        let items = ManifestTranslator::new(&tokens)
            .with_staging_root(&staging)
            .translate(&manifest)?;

        let planned: BTreeSet<PathBuf> = self
            .target_dirs(&items)
            .iter()
            .flat_map(|dir| missing_ancestors(dir, assume_removed))
            .collect();
        info!(
            version = header.version(),
            items = items.len(),
            planned_dirs = planned.len(),
            "install manifest translated"
        );
        Ok(InstallPlan {
            header,
            items,
            planned_dirs: planned.len(),
        })
    }

    fn prepare_uninstall(&mut self) -> Result<UninstallPlan> {
        let mut manifest = Manifest::for_file(self.locator.uninstall_manifest_path());
        self.read_with_retry(&mut manifest)?;
        let version = manifest.header()?.version().to_string();
        let tokens = self.locator.token_table();
        let items = ManifestTranslator::new(&tokens)
            .with_source_policy(SourcePolicy::AllowMissing)
            .translate(&manifest)?;
        info!(version = %version, items = items.len(), "uninstall manifest loaded");
        Ok(UninstallPlan { version, items })
    }

    /// Destination directories in first-use order; the install directory is
    /// always among them since it receives the uninstall manifest.
    fn target_dirs(&self, items: &[InstallerItem]) -> Vec<PathBuf> {
        let mut dirs = vec![self.locator.install_dir()];
        for item in items {
            let dir = if item.is_directory() {
                Some(item.destination())
            } else {
                item.destination_dir()
            };
            if let Some(dir) = dir {
                if !dirs.iter().any(|known| known == dir) {
                    dirs.push(dir.to_path_buf());
                }
            }
        }
        dirs
    }

    fn install_items(&mut self, plan: &InstallPlan, report: &mut RunReport) -> Result<()> {
        let limit = self.settings.recursion_limit;
        let mut record = Vec::new();

        for dir in self.target_dirs(&plan.items) {
            let created = create_dir_recorded(&dir, limit, &mut record)?;
            report.dirs_created += created;
            if created > 0 {
                self.task_done(created as u64);
            }
        }

        for item in &plan.items {
            if item.is_directory() {
                self.copy_tree(item.source(), item.destination(), &mut record, report, 0)?;
                continue;
            }
            copy_file(item.source(), item.destination())?;
            record.push(InstallerItem::file(item.destination(), PathBuf::new()));
            report.files_copied += 1;
            self.task_done(1);
        }

        let path = self.locator.uninstall_manifest_path();
        let mut manifest = Manifest::for_file(&path);
        manifest.set_header(&plan.header);
        manifest.set_data(&record);
        manifest.add_self()?;
        manifest.write()?;
        info!(path = %path.display(), entries = manifest.data().len(), "uninstall manifest written");

        report.installed_version = Some(plan.header.version().to_string());
        report.uninstall_manifest = Some(path);
        Ok(())
    }

    fn copy_tree(
        &mut self,
        source: &Path,
        destination: &Path,
        record: &mut Vec<InstallerItem>,
        report: &mut RunReport,
        depth: usize,
    ) -> Result<()> {
        let limit = self.settings.recursion_limit;
        if depth >= limit {
            return Err(Error::RecursionLimit {
                current: source.to_path_buf(),
                original: destination.to_path_buf(),
                limit,
            });
        }

        let created = create_dir_recorded(destination, limit, record)?;
        report.dirs_created += created;
        if created > 0 {
            self.task_done(created as u64);
        }

        let entries =
            fs::read_dir(source).io_context(|| format!("failed to read {}", source.display()))?;
        for entry in entries {
            let entry = entry.io_context(|| format!("failed to read {}", source.display()))?;
            let child = entry.path();
            let target = destination.join(entry.file_name());
            if child.is_dir() {
                self.copy_tree(&child, &target, record, report, depth + 1)?;
                continue;
            }
            copy_file(&child, &target)?;
            record.push(InstallerItem::file(&target, PathBuf::new()));
            report.files_copied += 1;
            self.task_done(1);
        }
        Ok(())
    }

    fn uninstall_items(&mut self, items: &[InstallerItem], report: &mut RunReport) -> Result<()> {
        let protected = self.locator.protected_dirs();
        let limit = self.settings.recursion_limit;
        let mut deferred = Vec::new();

        for item in items {
            let source = item.source();
            if source.is_file() {
                match delete_file_protected(source, &protected)? {
                    DeleteOutcome::Deleted => {
                        report.files_deleted += 1;
                        report.files_deleted += delete_compiled_siblings(
                            source,
                            &self.settings.compiled_extension,
                            &protected,
                        )?;
                    }
                    DeleteOutcome::Skipped => report.retained.push(source.to_path_buf()),
                    DeleteOutcome::Absent => {}
                }
                self.task_done(1);
            } else if source.is_dir() {
                deferred.push(source.to_path_buf());
            } else {
                debug!(path = %source.display(), "already absent");
                self.task_done(1);
            }
        }

        // Record order is outermost first, so walk it backwards.
        for dir in deferred.iter().rev() {
            match delete_dir_protected(dir, &protected, limit)? {
                DeleteOutcome::Deleted => report.dirs_deleted += 1,
                DeleteOutcome::Skipped => {
                    info!(path = %dir.display(), "directory retained");
                    report.retained.push(dir.clone());
                }
                DeleteOutcome::Absent => {}
            }
            self.task_done(1);
        }
        Ok(())
    }

    fn cleanup(&mut self, plan: &CleanupPlan, report: &mut RunReport) -> Result<()> {
        let protected = self.locator.protected_dirs();
        for file in &plan.files {
            match delete_file_protected(file, &protected)? {
                DeleteOutcome::Deleted => report.files_deleted += 1,
                DeleteOutcome::Skipped => report.retained.push(file.clone()),
                DeleteOutcome::Absent => {}
            }
            self.task_done(1);
        }
        for dir in &plan.dirs {
            match delete_dir_protected(dir, &protected, self.settings.recursion_limit)? {
                DeleteOutcome::Deleted => report.dirs_deleted += 1,
                DeleteOutcome::Skipped => report.retained.push(dir.clone()),
                DeleteOutcome::Absent => {}
            }
            self.task_done(1);
        }
        Ok(())
    }

    fn read_with_retry(&self, manifest: &mut Manifest) -> Result<()> {
        let attempts = self.settings.manifest_read_attempts.max(1);
        let mut attempt = 1;
        loop {
            match manifest.read() {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!(attempt, attempts, error = %err, "manifest read failed; retrying");
                    thread::sleep(self.settings.retry_backoff * attempt);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// The temp directory belongs to this run alone and is removed without a
    /// protection check.
    fn discard_temp(&self) {
        let temp = self.locator.temp_dir();
        if !temp.exists() {
            return;
        }
        if let Err(err) = remove_temp_tree(&temp) {
            warn!(error = %err, "temp directory left behind");
            return;
        }
        let _ = fs::remove_dir(self.locator.temp_parent());
    }

    fn transition(&mut self, next: RunState, report: &mut RunReport) {
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
        report.states.push(next);
    }

    fn tasks_total(&self, total: u64) {
        self.sink.emit(ProgressEvent::TasksTotal(total));
    }

    fn task_done(&self, count: u64) {
        self.sink.emit(ProgressEvent::TaskDone(count));
    }
}

pub fn spawn_run(orchestrator: InstallOrchestrator, mode: Mode) -> Result<RunHandle> {
    orchestrator.spawn(mode)
}

fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    fs::copy(source, destination).io_context(|| {
        format!(
            "failed to copy {} -> {}",
            source.display(),
            destination.display()
        )
    })?;
    debug!(source = %source.display(), destination = %destination.display(), "copied file");
    Ok(())
}

/// Front-end side of a spawned run.
pub struct RunHandle {
    events: mpsc::Receiver<ProgressEvent>,
    worker: JoinHandle<Result<RunReport>>,
    finished: bool,
}

impl RunHandle {
    /// Blocks for the next event; `None` once the worker has finished and
    /// every event was drained.
    pub fn next_event(&mut self) -> Option<ProgressEvent> {
        let event = self.events.recv().ok()?;
        if event.is_terminal() {
            self.finished = true;
        }
        Some(event)
    }

    /// A front-end may be dismissed only after `Error` or `Complete`.
    pub fn can_close(&self) -> bool {
        self.finished
    }

    pub fn wait(self) -> Result<RunReport> {
        self.worker.join().map_err(|panic| Error::Worker {
            message: panic_message(&*panic),
        })?
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "worker panicked".to_string()
}
