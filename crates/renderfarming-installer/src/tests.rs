use super::*;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use proptest::prelude::*;
use renderfarming_core::{
    split_data_line, strip_quotes, DirectoryPayload, Error, InstallerItem, Manifest,
    PayloadArchive, KNOWN_TOKENS,
};
use tempfile::TempDir;

struct Fixture {
    root: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        for dir in ["host", "scripts", "tmp"] {
            fs::create_dir_all(root.path().join(dir)).expect("must create host dirs");
        }
        Self { root }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    fn locator(&self) -> DirectoryLocator {
        DirectoryLocator::new(self.path("host"), self.path("scripts"), self.path("tmp"))
            .with_run_id("run-1")
    }

    /// Writes a payload directory named `name` holding `files` and an
    /// `install.man` made of a version header plus `lines`.
    fn payload(
        &self,
        name: &str,
        version: &str,
        files: &[(&str, &str)],
        lines: &[&str],
    ) -> Arc<dyn PayloadArchive> {
        let dir = self.path(name);
        for (rel, content) in files {
            write_file(&dir.join(rel), content);
        }
        let mut manifest = format!("#version|{version}\n");
        for line in lines {
            manifest.push_str(line);
            manifest.push('\n');
        }
        write_file(&dir.join(INSTALL_MANIFEST), &manifest);
        Arc::new(DirectoryPayload::new(dir))
    }

    fn orchestrator(&self, payload: Option<Arc<dyn PayloadArchive>>) -> InstallOrchestrator {
        let settings = RunSettings {
            retry_backoff: std::time::Duration::from_millis(1),
            ..RunSettings::default()
        };
        let mut orchestrator = InstallOrchestrator::new(self.locator(), settings);
        if let Some(payload) = payload {
            orchestrator.set_payload(payload);
        }
        orchestrator
    }
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("must create parent");
    }
    fs::write(path, content).expect("must write file");
}

fn manifest_sources(path: &Path) -> Vec<PathBuf> {
    let mut manifest = Manifest::for_file(path);
    manifest.read().expect("must read manifest");
    manifest
        .data()
        .iter()
        .map(|line| {
            let (source, _) = split_data_line(0, line).expect("must split");
            PathBuf::from(strip_quotes(&source))
        })
        .collect()
}

fn dir_listing(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .expect("must list dir")
        .map(|entry| {
            entry
                .expect("entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

fn basic_payload(fixture: &Fixture) -> Arc<dyn PayloadArchive> {
    fixture.payload(
        "payload-0010",
        "0010",
        &[("a.txt", "alpha"), ("b/c.txt", "charlie")],
        &[r#""a.txt"|$(main)"#, r#""b/c.txt"|$(main)"#],
    )
}

#[test]
fn locator_derives_package_directories() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let scripts = fixture.path("scripts");
    let host = fixture.path("host");

    assert_eq!(locator.install_dir(), scripts.join("RenderFarming"));
    assert_eq!(
        locator.macros_dir(),
        host.join("MacroScripts").join("RenderFarming")
    );
    assert_eq!(locator.startup_dir(), scripts.join("startup"));
    assert_eq!(
        locator.dark_icons_dir(),
        host.join("UI_ln").join("Icons").join("Dark").join("RenderFarming")
    );
    assert_eq!(
        locator.light_icons_dir(),
        host.join("UI_ln").join("Icons").join("Light").join("RenderFarming")
    );
    assert_eq!(locator.config_dir(), locator.install_dir().join("config"));
    assert_eq!(locator.log_dir(), locator.install_dir().join("logs"));
    assert_eq!(
        locator.temp_dir(),
        fixture.path("tmp").join("RenderFarming").join("run-1")
    );
    assert_eq!(
        locator.uninstall_manifest_path(),
        locator.install_dir().join(UNINSTALL_MANIFEST)
    );
    assert_eq!(
        locator.log_file_path(),
        locator.log_dir().join("RenderFarming_setup.log")
    );
}

#[test]
fn protected_set_excludes_shared_roots() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let protected = locator.protected_dirs();

    assert_eq!(protected.len(), 8);
    assert!(protected.contains(&locator.temp_dir()));
    assert!(protected.contains(&locator.install_dir().join("nested").join("deep")));
    assert!(!protected.contains(&locator.temp_parent()));
    assert!(!protected.contains(&fixture.path("tmp")));
    assert!(!protected.contains(&fixture.path("host")));
    assert!(!protected.contains(&fixture.path("scripts")));
    assert!(!protected.contains(&locator.icons_dir()));
    assert!(!protected.contains(&fixture.path("scripts").join("RenderFarmingExtra")));
    assert!(!protected.contains(&locator.install_dir().join("..").join("other")));
}

#[test]
fn protected_set_drops_bare_roots() {
    let protected = ProtectedDirs::new([PathBuf::from("/"), PathBuf::from("/srv/rf")]);
    assert_eq!(protected.len(), 1);
    assert!(!protected.contains(Path::new("/etc")));
    assert!(protected.contains(Path::new("/srv/rf/scripts")));
}

#[test]
fn every_known_token_resolves_inside_protected_set() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let tokens = locator.token_table();
    let protected = locator.protected_dirs();

    assert_eq!(tokens.len(), KNOWN_TOKENS.len());
    for token in KNOWN_TOKENS {
        let dir = tokens.resolve(token).expect("token must resolve");
        assert!(protected.contains(dir), "{token} -> {}", dir.display());
    }
}

#[test]
fn run_ids_are_sixteen_hex_chars() {
    let id = generate_run_id();
    assert_eq!(id.len(), 16);
    assert!(id.chars().all(|ch| ch.is_ascii_hexdigit()));
}

#[test]
fn static_host_requires_absolute_configured_paths() {
    let missing = StaticHost::from_parts(None, Some(PathBuf::from("/srv/scripts")));
    let err = missing.install_root().expect_err("must require install root");
    assert!(matches!(err, Error::Host { ref query, .. } if query == "install_root"));

    let relative = StaticHost::new("host", "/srv/scripts");
    assert!(relative.install_root().is_err());
    assert_eq!(
        relative.user_scripts_dir().expect("must answer"),
        PathBuf::from("/srv/scripts")
    );
}

#[test]
fn create_dir_recorded_records_outermost_first() {
    let fixture = Fixture::new();
    let target = fixture.path("fresh/a/b");
    let mut record = Vec::new();

    let created = create_dir_recorded(&target, 10, &mut record).expect("must create");
    assert_eq!(created, 3);
    assert_eq!(
        record,
        vec![
            InstallerItem::directory(fixture.path("fresh")),
            InstallerItem::directory(fixture.path("fresh/a")),
            InstallerItem::directory(fixture.path("fresh/a/b")),
        ]
    );
    assert!(target.is_dir());
}

#[test]
fn create_dir_recorded_is_idempotent() {
    let fixture = Fixture::new();
    let target = fixture.path("fresh/a");
    let mut record = Vec::new();
    create_dir_recorded(&target, 10, &mut record).expect("first create");

    let mut second = Vec::new();
    let created = create_dir_recorded(&target, 10, &mut second).expect("second create");
    assert_eq!(created, 0);
    assert!(second.is_empty());
}

#[test]
fn create_dir_recorded_stops_at_recursion_limit_without_creating() {
    let fixture = Fixture::new();
    let target = fixture.path("deep/a/b/c");
    let mut record = Vec::new();

    let err = create_dir_recorded(&target, 3, &mut record).expect_err("must hit ceiling");
    assert!(matches!(err, Error::RecursionLimit { limit: 3, .. }));
    assert!(record.is_empty());
    assert!(!fixture.path("deep").exists());

    let created = create_dir_recorded(&target, 4, &mut record).expect("must fit ceiling");
    assert_eq!(created, 4);
}

#[test]
fn missing_ancestors_honours_assumed_removals() {
    let fixture = Fixture::new();
    let existing = fixture.path("scripts/RenderFarming");
    fs::create_dir_all(&existing).expect("must create");

    assert!(missing_ancestors(&existing, &[]).is_empty());
    assert_eq!(
        missing_ancestors(&existing.join("x"), &[existing.clone()]),
        vec![existing.clone(), existing.join("x")]
    );
}

#[test]
fn protected_delete_refuses_paths_outside_the_set() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let protected = locator.protected_dirs();
    let outside = fixture.path("scripts/user.txt");
    write_file(&outside, "mine");

    let outcome = delete_file_protected(&outside, &protected).expect("must not fail");
    assert_eq!(outcome, DeleteOutcome::Skipped);
    assert!(outside.exists());

    let outcome = delete_dir_protected(&fixture.path("scripts"), &protected, 10)
        .expect("must not fail");
    assert_eq!(outcome, DeleteOutcome::Skipped);
    assert!(fixture.path("scripts").is_dir());

    assert_eq!(
        delete_file_protected(&locator.install_dir().join("gone.txt"), &protected)
            .expect("must not fail"),
        DeleteOutcome::Absent
    );
}

#[test]
fn compiled_siblings_are_removed_with_their_source() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let install = locator.install_dir();
    let source = install.join("tool.py");
    write_file(&source, "print()");
    write_file(&install.join("tool.pyc"), "bytecode");
    write_file(&install.join("__pycache__/tool.cpython-311.pyc"), "bytecode");
    write_file(&install.join("__pycache__/other.cpython-311.pyc"), "bytecode");

    let deleted = delete_compiled_siblings(&source, "pyc", &locator.protected_dirs())
        .expect("must delete siblings");
    assert_eq!(deleted, 2);
    assert!(source.exists());
    assert!(!install.join("tool.pyc").exists());
    assert!(install.join("__pycache__/other.cpython-311.pyc").exists());
}

#[test]
fn fresh_install_copies_files_and_writes_uninstall_manifest() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let install = locator.install_dir();

    let report = fixture
        .orchestrator(Some(basic_payload(&fixture)))
        .run(Mode::Install)
        .expect("install must succeed");

    assert_eq!(fs::read_to_string(install.join("a.txt")).expect("a"), "alpha");
    assert_eq!(fs::read_to_string(install.join("c.txt")).expect("c"), "charlie");
    assert_eq!(report.files_copied, 2);
    assert_eq!(report.dirs_created, 1);
    assert_eq!(report.installed_version.as_deref(), Some("0010"));
    assert_eq!(
        report.states,
        vec![
            RunState::Idle,
            RunState::Preparing,
            RunState::Installing,
            RunState::CleaningUp,
            RunState::Complete,
        ]
    );

    let uninstall = locator.uninstall_manifest_path();
    assert_eq!(report.uninstall_manifest.as_deref(), Some(uninstall.as_path()));
    assert_eq!(
        manifest_sources(&uninstall),
        vec![
            install.clone(),
            install.join("a.txt"),
            install.join("c.txt"),
            uninstall.clone(),
        ]
    );
    assert_eq!(
        installed_version(&locator).expect("must read").as_deref(),
        Some("0010")
    );
    assert!(!locator.temp_dir().exists());
    assert!(!locator.temp_parent().exists());
}

#[test]
fn install_then_uninstall_restores_prior_state() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    fixture
        .orchestrator(Some(basic_payload(&fixture)))
        .run(Mode::Install)
        .expect("install must succeed");

    let report = fixture
        .orchestrator(None)
        .run(Mode::Uninstall)
        .expect("uninstall must succeed");

    assert!(!locator.install_dir().exists());
    assert_eq!(report.previous_version.as_deref(), Some("0010"));
    assert_eq!(report.files_deleted, 3);
    assert_eq!(report.dirs_deleted, 1);
    assert!(report.retained.is_empty());
    assert!(fixture.path("scripts").is_dir());
}

#[test]
fn uninstall_keeps_directory_holding_foreign_files() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let install = locator.install_dir();
    fixture
        .orchestrator(Some(basic_payload(&fixture)))
        .run(Mode::Install)
        .expect("install must succeed");
    write_file(&install.join("notes.txt"), "user data");

    let sink = RecordingSink::new();
    let report = fixture
        .orchestrator(None)
        .with_sink(sink.clone())
        .run(Mode::Uninstall)
        .expect("uninstall must still complete");

    assert!(!install.join("a.txt").exists());
    assert!(install.join("notes.txt").exists());
    assert_eq!(report.retained, vec![install.clone()]);
    assert_eq!(sink.events().last(), Some(&ProgressEvent::Complete));
}

#[test]
fn uninstall_without_install_reports_error_event() {
    let fixture = Fixture::new();
    let sink = RecordingSink::new();

    let err = fixture
        .orchestrator(None)
        .with_sink(sink.clone())
        .run(Mode::Uninstall)
        .expect_err("nothing to uninstall");
    assert!(matches!(err, Error::ManifestNotFound { .. }));

    let events = sink.events();
    assert_eq!(events.iter().filter(|event| event.is_terminal()).count(), 1);
    match events.last() {
        Some(ProgressEvent::Error(message)) => assert!(message.starts_with("Uninstall failed")),
        other => panic!("unexpected final event {other:?}"),
    }
}

#[test]
fn install_emits_total_once_then_one_terminal_event() {
    let fixture = Fixture::new();
    let sink = RecordingSink::new();
    fixture
        .orchestrator(Some(basic_payload(&fixture)))
        .with_sink(sink.clone())
        .run(Mode::Install)
        .expect("install must succeed");

    let events = sink.events();
    assert_eq!(events.first(), Some(&ProgressEvent::TasksTotal(3)));
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, ProgressEvent::TasksTotal(_)))
            .count(),
        1
    );
    let done: u64 = events
        .iter()
        .map(|event| match event {
            ProgressEvent::TaskDone(count) => *count,
            _ => 0,
        })
        .sum();
    assert_eq!(done, 3);
    assert_eq!(events.iter().filter(|event| event.is_terminal()).count(), 1);
    assert_eq!(events.last(), Some(&ProgressEvent::Complete));
}

#[test]
fn install_with_unknown_token_fails_before_touching_destinations() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let payload = fixture.payload(
        "payload-bad",
        "0010",
        &[("a.txt", "alpha")],
        &[r#""a.txt"|$(main)"#, r#""a.txt"|$(nowhere)"#],
    );

    let err = fixture
        .orchestrator(Some(payload))
        .run(Mode::Install)
        .expect_err("must reject unknown token");
    assert!(matches!(err, Error::UnknownToken { line: 3, .. }));
    assert!(!locator.install_dir().exists());
    assert!(!locator.temp_dir().exists());
}

#[test]
fn install_without_payload_is_an_error() {
    let fixture = Fixture::new();
    let err = fixture
        .orchestrator(None)
        .run(Mode::Install)
        .expect_err("payload required");
    assert!(matches!(err, Error::Archive { .. }));
}

#[test]
fn directory_entries_are_copied_and_removed_recursively() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let install = locator.install_dir();
    let payload = fixture.payload(
        "payload-tree",
        "0010",
        &[("presets/x.txt", "x"), ("presets/sub/y.txt", "y")],
        &[r#""presets"|$(main)"#],
    );

    fixture
        .orchestrator(Some(payload))
        .run(Mode::Install)
        .expect("install must succeed");
    assert!(install.join("presets/x.txt").is_file());
    assert!(install.join("presets/sub/y.txt").is_file());

    fixture
        .orchestrator(None)
        .run(Mode::Uninstall)
        .expect("uninstall must succeed");
    assert!(!install.exists());
}

#[test]
fn uninstall_removes_compiled_artifacts_and_cache_dir() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let install = locator.install_dir();
    let payload = fixture.payload(
        "payload-py",
        "0010",
        &[("tool.py", "print()")],
        &[r#""tool.py"|$(main)"#],
    );
    fixture
        .orchestrator(Some(payload))
        .run(Mode::Install)
        .expect("install must succeed");
    write_file(&install.join("tool.pyc"), "bytecode");
    write_file(&install.join("__pycache__/tool.cpython-311.pyc"), "bytecode");

    fixture
        .orchestrator(None)
        .run(Mode::Uninstall)
        .expect("uninstall must succeed");
    assert!(!install.exists());
}

#[test]
fn upgrade_replaces_old_file_set() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let install = locator.install_dir();
    let old = fixture.payload(
        "payload-0010",
        "0010",
        &[("a.txt", "alpha v1"), ("old.txt", "legacy")],
        &[r#""a.txt"|$(main)"#, r#""old.txt"|$(main)"#],
    );
    fixture
        .orchestrator(Some(old))
        .run(Mode::Install)
        .expect("install must succeed");

    let new = fixture.payload(
        "payload-0020",
        "0020",
        &[("a.txt", "alpha v2"), ("new.txt", "fresh")],
        &[r#""a.txt"|$(main)"#, r#""new.txt"|$(main)"#],
    );
    let report = fixture
        .orchestrator(Some(new))
        .run(Mode::Upgrade)
        .expect("upgrade must succeed");

    assert_eq!(report.previous_version.as_deref(), Some("0010"));
    assert_eq!(report.installed_version.as_deref(), Some("0020"));
    assert_eq!(
        dir_listing(&install),
        BTreeSet::from([
            "a.txt".to_string(),
            "new.txt".to_string(),
            UNINSTALL_MANIFEST.to_string(),
        ])
    );
    assert_eq!(fs::read_to_string(install.join("a.txt")).expect("a"), "alpha v2");
    assert_eq!(
        report.states,
        vec![
            RunState::Idle,
            RunState::Preparing,
            RunState::Uninstalling,
            RunState::Installing,
            RunState::CleaningUp,
            RunState::Complete,
        ]
    );
    assert_eq!(
        installed_version(&locator).expect("must read").as_deref(),
        Some("0020")
    );
}

#[test]
fn upgrade_with_broken_payload_leaves_existing_install() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    fixture
        .orchestrator(Some(basic_payload(&fixture)))
        .run(Mode::Install)
        .expect("install must succeed");

    let broken = fixture.payload(
        "payload-broken",
        "0020",
        &[],
        &[r#""missing.txt"|$(main)"#],
    );
    let err = fixture
        .orchestrator(Some(broken))
        .run(Mode::Upgrade)
        .expect_err("missing source must abort");
    assert!(matches!(err, Error::MissingSource { .. }));
    assert!(locator.install_dir().join("a.txt").is_file());
    assert_eq!(
        installed_version(&locator).expect("must read").as_deref(),
        Some("0010")
    );
}

#[test]
fn upgrade_without_previous_install_acts_as_install() {
    let fixture = Fixture::new();
    let report = fixture
        .orchestrator(Some(basic_payload(&fixture)))
        .run(Mode::Upgrade)
        .expect("upgrade must succeed");
    assert!(report.previous_version.is_none());
    assert_eq!(report.files_copied, 2);
}

#[test]
fn cleanup_removes_marker_files_and_keeps_foreign_ones() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let install = locator.install_dir();
    write_file(&locator.log_file_path(), "log");
    write_file(&locator.config_dir().join("RenderFarming.ini"), "cfg");
    write_file(&locator.config_dir().join("user.ini"), "keep");
    write_file(&install.join("RenderFarming_cache.txt"), "cache");

    let plan = CleanupPlan::discover(&locator).expect("must discover");
    assert_eq!(plan.files.len(), 3);
    assert_eq!(plan.dirs.len(), 3);

    let report = fixture
        .orchestrator(None)
        .run(Mode::Cleanup)
        .expect("cleanup must succeed");
    assert_eq!(report.files_deleted, 3);
    assert!(!locator.log_dir().exists());
    assert!(locator.config_dir().join("user.ini").is_file());
    assert!(!locator.config_dir().join("RenderFarming.ini").exists());
    assert!(install.is_dir());
}

#[test]
fn cleanup_removes_emptied_install_dir() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    write_file(&locator.log_file_path(), "log");

    fixture
        .orchestrator(None)
        .run(Mode::Cleanup)
        .expect("cleanup must succeed");
    assert!(!locator.install_dir().exists());
}

#[test]
fn spawned_run_closes_only_after_terminal_event() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator(Some(basic_payload(&fixture)));
    let mut handle = spawn_run(orchestrator, Mode::Install).expect("must spawn");
    assert!(!handle.can_close());

    let mut events = Vec::new();
    while let Some(event) = handle.next_event() {
        events.push(event);
    }
    assert!(handle.can_close());
    assert_eq!(events.last(), Some(&ProgressEvent::Complete));

    let report = handle.wait().expect("worker must succeed");
    assert_eq!(report.files_copied, 2);
}

#[test]
fn status_recommends_mode_from_installed_version() {
    let fixture = Fixture::new();
    let locator = fixture.locator();
    let payload = basic_payload(&fixture);

    let status = inspect(&locator, Some(payload.clone())).expect("must inspect");
    assert_eq!(status.installed_version, None);
    assert_eq!(status.payload_version.as_deref(), Some("0010"));
    assert_eq!(status.recommended, Mode::Install);

    fixture
        .orchestrator(Some(payload))
        .run(Mode::Install)
        .expect("install must succeed");
    let status = inspect(&locator, None).expect("must inspect");
    assert_eq!(status.installed_version.as_deref(), Some("0010"));
    assert_eq!(status.recommended, Mode::Upgrade);
}

#[test]
fn mode_parses_case_insensitively() {
    assert_eq!(Mode::parse(" Upgrade "), Some(Mode::Upgrade));
    assert_eq!(Mode::parse("cleanup"), Some(Mode::Cleanup));
    assert_eq!(Mode::parse("repair"), None);
    assert_eq!(Mode::Uninstall.as_str(), "uninstall");
}

#[test]
fn config_parses_with_defaults() {
    let config = InstallerConfig::from_toml_str(
        r#"
install_root = "/opt/host"
user_scripts_dir = "/home/artist/scripts"
recursion_limit = 40
"#,
    )
    .expect("must parse");
    assert_eq!(config.install_root, Some(PathBuf::from("/opt/host")));
    assert_eq!(config.recursion_limit, 40);
    assert_eq!(config.manifest_read_attempts, 3);
    assert_eq!(config.package_marker, DEFAULT_PACKAGE_MARKER);
    assert_eq!(config.settings().recursion_limit, 40);
    assert_eq!(config.settings().compiled_extension, "pyc");
}

#[test]
fn config_rejects_unknown_keys_and_zero_limits() {
    assert!(InstallerConfig::from_toml_str("install_dir = \"/x\"").is_err());
    assert!(InstallerConfig::from_toml_str("recursion_limit = 0").is_err());
    assert!(InstallerConfig::from_toml_str("manifest_read_attempts = 0").is_err());
    assert!(InstallerConfig::from_toml_str("package_marker = \"a/b\"").is_err());
}

#[test]
fn config_fallback_fills_only_missing_host_paths() {
    let config = InstallerConfig {
        install_root: Some(PathBuf::from("/opt/host")),
        ..InstallerConfig::default()
    }
    .with_fallback_from(|key| Some(PathBuf::from(format!("/env/{key}"))));

    assert_eq!(config.install_root, Some(PathBuf::from("/opt/host")));
    assert_eq!(
        config.user_scripts_dir,
        Some(PathBuf::from(format!("/env/{USER_SCRIPTS_ENV}")))
    );
    let locator = config.locator().expect("must build locator");
    assert_eq!(
        locator.install_dir(),
        PathBuf::from(format!("/env/{USER_SCRIPTS_ENV}")).join("RenderFarming")
    );
}

proptest! {
    #[test]
    fn protection_is_segment_prefix_containment(
        segments in prop::collection::vec("[abc]{1,2}", 0..5),
    ) {
        let base = PathBuf::from("/srv/rf");
        let protected = ProtectedDirs::new([base.join("a"), base.join("b").join("c")]);
        let candidate = segments.iter().fold(base.clone(), |path, segment| path.join(segment));

        let expected = matches!(segments.first().map(String::as_str), Some("a"))
            || (segments.first().map(String::as_str) == Some("b")
                && segments.get(1).map(String::as_str) == Some("c"));
        prop_assert_eq!(protected.contains(&candidate), expected);

        let escaped = base.join("a").join("..").join(segments.join("/"));
        prop_assert!(!protected.contains(&escaped));
    }

    #[test]
    fn protected_deletion_follows_containment(
        segments in prop::collection::vec("[abc]{1,2}", 1..4),
    ) {
        let root = TempDir::new().expect("tempdir");
        let base = root.path().to_path_buf();
        let protected = ProtectedDirs::new([base.join("a"), base.join("b").join("c")]);
        let candidate = segments.iter().fold(base.clone(), |path, segment| path.join(segment));
        let file = candidate.join("f.txt");
        fs::create_dir_all(&candidate).expect("must create candidate");
        fs::write(&file, "x").expect("must write file");

        let expected = if protected.contains(&candidate) {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::Skipped
        };
        prop_assert_eq!(
            delete_file_protected(&file, &protected).expect("file deletion must not fail"),
            expected
        );
        prop_assert_eq!(file.exists(), expected == DeleteOutcome::Skipped);
        prop_assert_eq!(
            delete_dir_protected(&candidate, &protected, DEFAULT_RECURSION_LIMIT)
                .expect("directory deletion must not fail"),
            expected
        );
        prop_assert_eq!(candidate.exists(), expected == DeleteOutcome::Skipped);
    }
}
