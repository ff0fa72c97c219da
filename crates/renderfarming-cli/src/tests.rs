use super::*;

use std::fs;
use std::path::PathBuf;

use crate::render::{render_status_line, resolve_output_style, OutputStyle};
use tempfile::TempDir;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("must parse")
}

fn sample_report(mode: Mode) -> RunReport {
    RunReport {
        mode,
        states: Vec::new(),
        previous_version: Some("0010".to_string()),
        installed_version: Some("0020".to_string()),
        dirs_created: 1,
        files_copied: 2,
        files_deleted: 3,
        dirs_deleted: 1,
        retained: vec![PathBuf::from("/scripts/RenderFarming")],
        uninstall_manifest: None,
    }
}

#[test]
fn cli_parses_global_flags_after_subcommand() {
    let cli = parse(&[
        "rf-setup",
        "install",
        "--payload",
        "payload.zip",
        "--install-root",
        "/opt/host",
        "-v",
    ]);
    assert!(cli.verbose);
    assert_eq!(cli.install_root, Some(PathBuf::from("/opt/host")));
    match cli.command {
        Commands::Install { payload } => assert_eq!(payload, PathBuf::from("payload.zip")),
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn cli_requires_payload_for_install_and_upgrade() {
    assert!(Cli::try_parse_from(["rf-setup", "install"]).is_err());
    assert!(Cli::try_parse_from(["rf-setup", "upgrade"]).is_err());
    assert!(Cli::try_parse_from(["rf-setup", "status"]).is_ok());
}

#[test]
fn sweeping_commands_do_not_append_to_log_file() {
    assert!(!parse(&["rf-setup", "cleanup"]).command.appends_log_file());
    assert!(!parse(&["rf-setup", "uninstall", "--cleanup"])
        .command
        .appends_log_file());
    assert!(parse(&["rf-setup", "uninstall"]).command.appends_log_file());
    assert!(parse(&["rf-setup", "paths"]).command.appends_log_file());
}

#[test]
fn flags_override_config_file_values() {
    let dir = TempDir::new().expect("tempdir");
    let config_path = dir.path().join("rf-setup.toml");
    fs::write(
        &config_path,
        "install_root = \"/from/file\"\nuser_scripts_dir = \"/file/scripts\"\nrecursion_limit = 12\n",
    )
    .expect("must write config");

    let config_arg = config_path.to_string_lossy().into_owned();
    let cli = parse(&[
        "rf-setup",
        "--config",
        &config_arg,
        "--install-root",
        "/from/flag",
        "paths",
    ]);
    let config = resolve_config(&cli).expect("must resolve");
    assert_eq!(config.install_root, Some(PathBuf::from("/from/flag")));
    assert_eq!(config.user_scripts_dir, Some(PathBuf::from("/file/scripts")));
    assert_eq!(config.recursion_limit, 12);
}

#[test]
fn invalid_config_file_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let config_path = dir.path().join("rf-setup.toml");
    fs::write(&config_path, "recursion_limit = 0\n").expect("must write config");

    let config_arg = config_path.to_string_lossy().into_owned();
    let cli = parse(&["rf-setup", "--config", &config_arg, "paths"]);
    assert!(resolve_config(&cli).is_err());
}

#[test]
fn resolve_output_style_uses_rich_when_stdout_is_tty() {
    assert_eq!(resolve_output_style(true), OutputStyle::Rich);
    assert_eq!(resolve_output_style(false), OutputStyle::Plain);
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "install complete"),
        "install complete"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "install complete"),
        "[OK] install complete"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "err", "Install failed"),
        "[ERR] Install failed"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "step", "copying"),
        "[..] copying"
    );
}

#[test]
fn format_report_lines_describes_upgrade() {
    let lines = format_report_lines(&sample_report(Mode::Upgrade), OutputStyle::Rich);
    assert_eq!(lines[0], "[OK] upgrade complete: 0010 -> 0020");
    assert_eq!(
        lines[1],
        "[..] files: copied=2 deleted=3; directories: created=1 deleted=1"
    );
    assert_eq!(lines[2], "[WARN] retained /scripts/RenderFarming");
}

#[test]
fn format_report_lines_plain_for_uninstall() {
    let lines = format_report_lines(&sample_report(Mode::Uninstall), OutputStyle::Plain);
    assert_eq!(lines[0], "uninstall complete: removed version 0010");
    assert_eq!(lines.len(), 3);
}

#[test]
fn format_path_lines_lists_protected_set() {
    let locator = DirectoryLocator::new("/opt/host", "/home/artist/scripts", "/tmp")
        .with_run_id("abc");
    let lines = format_path_lines(&locator);
    let protected_at = lines
        .iter()
        .position(|line| line == "protected:")
        .expect("must list protected set");
    assert_eq!(lines.len() - protected_at - 1, 8);
    assert!(lines
        .iter()
        .any(|line| line.starts_with("uninstall manifest: ")));
}

#[test]
fn default_log_directive_follows_verbosity() {
    assert_eq!(crate::logging::default_directive(false), "info");
    assert_eq!(crate::logging::default_directive(true), "debug");
}

#[test]
fn execute_mode_runs_install_and_uninstall() {
    let dir = TempDir::new().expect("tempdir");
    let payload = dir.path().join("payload");
    fs::create_dir_all(&payload).expect("must create payload");
    fs::write(payload.join("a.txt"), "alpha").expect("must write");
    fs::write(
        payload.join("install.man"),
        "#version|0030\n\"a.txt\"|$(main)\n",
    )
    .expect("must write manifest");
    for sub in ["host", "scripts", "tmp"] {
        fs::create_dir_all(dir.path().join(sub)).expect("must create");
    }

    let config = InstallerConfig {
        install_root: Some(dir.path().join("host")),
        user_scripts_dir: Some(dir.path().join("scripts")),
        temp_root: Some(dir.path().join("tmp")),
        ..InstallerConfig::default()
    };
    let renderer = TerminalRenderer::from_style(OutputStyle::Plain);

    let locator = config.locator().expect("must locate");
    let install_dir = locator.install_dir();
    let report = execute_mode(&config, locator, Mode::Install, Some(&payload), renderer)
        .expect("install must succeed");
    assert_eq!(report.installed_version.as_deref(), Some("0030"));
    assert!(install_dir.join("a.txt").is_file());

    let locator = config.locator().expect("must locate");
    execute_mode(&config, locator, Mode::Uninstall, None, renderer)
        .expect("uninstall must succeed");
    assert!(!install_dir.exists());
}
