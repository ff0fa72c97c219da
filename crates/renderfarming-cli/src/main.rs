use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use renderfarming_core::open_payload;
use renderfarming_installer::{
    inspect, installed_version, spawn_run, DirectoryLocator, InstallOrchestrator, InstallerConfig,
    Mode, ProgressEvent, RunReport,
};

mod logging;
mod render;

use logging::init_logging;
use render::{format_report_lines, format_status_lines, TerminalProgress, TerminalRenderer};

#[derive(Parser, Debug)]
#[command(name = "rf-setup")]
#[command(about = "Install, upgrade and remove the RenderFarming plugin", long_about = None)]
struct Cli {
    /// TOML file with installer settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Host application install directory.
    #[arg(long, global = true)]
    install_root: Option<PathBuf>,
    /// Host per-user scripts directory.
    #[arg(long, global = true)]
    scripts_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    temp_root: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install from a payload directory or .zip archive.
    Install {
        #[arg(long)]
        payload: PathBuf,
    },
    /// Remove the installed version, then install the payload.
    Upgrade {
        #[arg(long)]
        payload: PathBuf,
    },
    Uninstall {
        /// Also sweep leftover logs and config files.
        #[arg(long)]
        cleanup: bool,
    },
    /// Remove logs and config files carrying the package name.
    Cleanup,
    Status {
        #[arg(long)]
        payload: Option<PathBuf>,
    },
    /// Print every directory the installer reads or writes.
    Paths,
}

impl Commands {
    /// Sweeping runs delete the log file, so they must not hold it open.
    fn appends_log_file(&self) -> bool {
        !matches!(self, Self::Cleanup | Self::Uninstall { cleanup: true })
    }
}

fn main() -> Result<()> {
    run_cli(Cli::parse())
}

fn run_cli(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let log_file = config
        .locator()
        .ok()
        .filter(|locator| cli.command.appends_log_file() && locator.log_dir().is_dir())
        .map(|locator| locator.log_file_path());
    init_logging(cli.verbose, log_file.as_deref())?;

    let renderer = TerminalRenderer::current();
    match cli.command {
        Commands::Install { payload } => {
            let locator = config.locator()?;
            if let Some(version) = installed_version(&locator)? {
                return Err(anyhow!(
                    "{} {version} is already installed; use `rf-setup upgrade --payload {}` instead",
                    locator.marker(),
                    payload.display()
                ));
            }
            let report = execute_mode(&config, locator, Mode::Install, Some(&payload), renderer)?;
            renderer.print_lines(&format_report_lines(&report, renderer.style()));
        }
        Commands::Upgrade { payload } => {
            let locator = config.locator()?;
            let report = execute_mode(&config, locator, Mode::Upgrade, Some(&payload), renderer)?;
            renderer.print_lines(&format_report_lines(&report, renderer.style()));
        }
        Commands::Uninstall { cleanup } => {
            let report = execute_mode(&config, config.locator()?, Mode::Uninstall, None, renderer)?;
            renderer.print_lines(&format_report_lines(&report, renderer.style()));
            if cleanup {
                let report =
                    execute_mode(&config, config.locator()?, Mode::Cleanup, None, renderer)?;
                renderer.print_lines(&format_report_lines(&report, renderer.style()));
            }
        }
        Commands::Cleanup => {
            let report = execute_mode(&config, config.locator()?, Mode::Cleanup, None, renderer)?;
            renderer.print_lines(&format_report_lines(&report, renderer.style()));
        }
        Commands::Status { payload } => {
            let locator = config.locator()?;
            let payload = payload
                .map(|path| open_payload(&path).map(Arc::from))
                .transpose()?;
            let status = inspect(&locator, payload)?;
            renderer.print_lines(&format_status_lines(&status));
        }
        Commands::Paths => {
            let locator = config.locator()?;
            renderer.print_lines(&format_path_lines(&locator));
        }
    }

    Ok(())
}

/// File values first, then flags, then the environment for host paths still
/// unset.
fn resolve_config(cli: &Cli) -> Result<InstallerConfig> {
    let mut config = match &cli.config {
        Some(path) => InstallerConfig::load(path)?,
        None => InstallerConfig::default(),
    };
    if let Some(root) = &cli.install_root {
        config.install_root = Some(root.clone());
    }
    if let Some(scripts) = &cli.scripts_dir {
        config.user_scripts_dir = Some(scripts.clone());
    }
    if let Some(temp_root) = &cli.temp_root {
        config.temp_root = Some(temp_root.clone());
    }
    Ok(config.with_env_fallback())
}

fn execute_mode(
    config: &InstallerConfig,
    locator: DirectoryLocator,
    mode: Mode,
    payload: Option<&Path>,
    renderer: TerminalRenderer,
) -> Result<RunReport> {
    let mut orchestrator = InstallOrchestrator::new(locator, config.settings());
    if let Some(path) = payload {
        orchestrator.set_payload(Arc::from(open_payload(path)?));
    }

    renderer.print_section(mode.as_str());
    let mut handle = spawn_run(orchestrator, mode)?;
    let mut progress: Option<TerminalProgress> = None;
    let mut done = 0_u64;
    let mut failure = None;
    while let Some(event) = handle.next_event() {
        match event {
            ProgressEvent::TasksTotal(total) => {
                progress = Some(renderer.start_progress(mode.as_str(), total));
            }
            ProgressEvent::TaskDone(count) => {
                done += count;
                if let Some(progress) = progress.as_mut() {
                    progress.set(done);
                }
            }
            ProgressEvent::Error(message) => failure = Some(message),
            ProgressEvent::Complete => {}
        }
    }

    let result = handle.wait();
    if let Some(progress) = progress {
        if result.is_ok() {
            progress.finish_success();
        } else {
            progress.finish_abandon();
        }
    }
    if let Some(message) = failure {
        renderer.print_status("err", &message);
    }
    Ok(result?)
}

fn format_path_lines(locator: &DirectoryLocator) -> Vec<String> {
    let mut lines: Vec<String> = locator
        .named_dirs()
        .into_iter()
        .map(|(label, dir)| format!("{label}: {}", dir.display()))
        .collect();
    lines.push(format!(
        "uninstall manifest: {}",
        locator.uninstall_manifest_path().display()
    ));
    lines.push(format!("log file: {}", locator.log_file_path().display()));
    lines.push("protected:".to_string());
    lines.extend(
        locator
            .protected_dirs()
            .iter()
            .map(|dir| format!("- {}", dir.display())),
    );
    lines
}

#[cfg(test)]
mod tests;
