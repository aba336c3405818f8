use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use testbed_core::cores::{collect_crashes, CollectError, CoreDumpLocator, DirCoreLocator};

/// Locator backed by a fixed pid -> core-file map, standing in for the
/// external core-dump service.
struct MapLocator {
    cores: HashMap<u32, PathBuf>,
}

impl CoreDumpLocator for MapLocator {
    fn find_core(&self, _name_pattern: &str, _working_directory: &Path, pid: u32) -> Option<PathBuf> {
        self.cores.get(&pid).cloned()
    }
}

#[test]
fn no_matching_cores_completes_and_leaves_archive_empty() {
    let temp = tempfile::tempdir().unwrap();
    let locator = MapLocator { cores: HashMap::new() };

    let report = collect_crashes(&locator, &[101, 102, 103], temp.path(), &[]).expect("collect");

    assert!(report.recovered.is_empty());
    assert!(report.warnings.is_empty());

    // The archive directory itself is still created.
    let cores_dir = temp.path().join("cores");
    assert!(cores_dir.is_dir());
    assert_eq!(fs::read_dir(&cores_dir).unwrap().count(), 0);
}

#[test]
fn single_core_is_relocated_and_binaries_preserved() {
    let temp = tempfile::tempdir().unwrap();
    let core_file = temp.path().join("core.server-node.102");
    fs::write(&core_file, b"crash dump").unwrap();

    let bin_src = temp.path().join("build");
    fs::create_dir_all(&bin_src).unwrap();
    let master = bin_src.join("server-master");
    let node = bin_src.join("server-node");
    fs::write(&master, b"elf-master").unwrap();
    fs::write(&node, b"elf-node").unwrap();

    let locator =
        MapLocator { cores: HashMap::from([(102, core_file.clone())]) };
    let report = collect_crashes(
        &locator,
        &[101, 102, 103],
        temp.path(),
        &[master.clone(), node.clone()],
    )
    .expect("collect");

    assert_eq!(report.recovered.len(), 1);
    assert_eq!(report.recovered[0].pid, 102);
    assert!(report.warnings.is_empty());

    let cores_dir = temp.path().join("cores");
    // The core was moved, not copied.
    assert!(!core_file.exists());
    assert_eq!(
        fs::read(cores_dir.join("core.server-node.102")).unwrap(),
        b"crash dump"
    );

    // Every supplied binary rides along for offline symbol resolution.
    assert_eq!(fs::read(cores_dir.join("server-master")).unwrap(), b"elf-master");
    assert_eq!(fs::read(cores_dir.join("server-node")).unwrap(), b"elf-node");
    // Originals are untouched.
    assert!(master.exists());
    assert!(node.exists());
}

#[test]
fn binary_preservation_is_skipped_when_nothing_was_recovered() {
    let temp = tempfile::tempdir().unwrap();
    let binary = temp.path().join("server-master");
    fs::write(&binary, b"elf").unwrap();

    let locator = MapLocator { cores: HashMap::new() };
    collect_crashes(&locator, &[7], temp.path(), &[binary]).expect("collect");

    assert!(!temp.path().join("cores/server-master").exists());
}

#[test]
fn missing_binary_during_preservation_is_a_warning_not_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let core_file = temp.path().join("core.server-master.55");
    fs::write(&core_file, b"dump").unwrap();

    let locator = MapLocator { cores: HashMap::from([(55, core_file)]) };
    let report = collect_crashes(
        &locator,
        &[55],
        temp.path(),
        &[PathBuf::from("/no/such/server-master")],
    )
    .expect("collect must not fail on a single binary");

    assert_eq!(report.recovered.len(), 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].detail.contains("preserve"));
}

#[test]
fn binaries_are_preserved_when_a_found_core_cannot_be_moved() {
    let temp = tempfile::tempdir().unwrap();
    let binary = temp.path().join("server-master");
    fs::write(&binary, b"elf").unwrap();

    // The locator names a core that is gone by relocation time (foreign cores
    // behave the same way); the find alone must trigger binary preservation.
    let locator =
        MapLocator { cores: HashMap::from([(88, temp.path().join("core.server-master.88"))]) };
    let report = collect_crashes(&locator, &[88], temp.path(), &[binary]).expect("collect");

    assert!(report.recovered.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].detail.contains("relocate"));
    assert_eq!(
        fs::read(temp.path().join("cores/server-master")).unwrap(),
        b"elf",
        "binaries must ride along for symbol resolution once a core was found"
    );
}

#[test]
fn core_copied_but_not_unlinked_counts_as_recovered() {
    // Permission checks do not bind root; the read-only setup below would be
    // a no-op.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }

    let temp = tempfile::tempdir().unwrap();
    let spool = temp.path().join("spool");
    fs::create_dir_all(&spool).unwrap();
    let core_file = spool.join("core.server-node.9");
    fs::write(&core_file, b"dump").unwrap();

    // Read-only parent: rename and unlink of the source both fail, while the
    // copy into the archive still goes through.
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(&spool).unwrap().permissions();
    perms.set_mode(0o555);
    fs::set_permissions(&spool, perms.clone()).unwrap();

    let locator = MapLocator { cores: HashMap::from([(9, core_file.clone())]) };
    let report = collect_crashes(&locator, &[9], temp.path(), &[]).expect("collect");

    perms.set_mode(0o755);
    fs::set_permissions(&spool, perms).unwrap();

    // The archive holds a complete artifact, so the report says recovered
    // even though the stale source is still in place.
    assert_eq!(report.recovered.len(), 1);
    assert!(report.warnings.is_empty());
    assert_eq!(fs::read(temp.path().join("cores/core.server-node.9")).unwrap(), b"dump");
    assert!(core_file.exists());
}

#[test]
fn archive_directory_failure_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    // Occupy the archive path with a plain file so the directory cannot be
    // created.
    fs::write(temp.path().join("cores"), "not a directory").unwrap();

    let locator = MapLocator { cores: HashMap::new() };
    let err = collect_crashes(&locator, &[1], temp.path(), &[]).unwrap_err();
    assert!(matches!(err, CollectError::ArchiveDir { .. }));
}

#[test]
fn dir_locator_matches_kernel_style_core_names() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("core.server-master.1234"), b"x").unwrap();
    fs::write(temp.path().join("server.log"), b"y").unwrap();

    let locator = DirCoreLocator;
    let found = locator.find_core("*", temp.path(), 1234).expect("core found");
    assert_eq!(found, temp.path().join("core.server-master.1234"));

    assert!(locator.find_core("*", temp.path(), 99).is_none());
}

#[test]
fn dir_locator_matches_bare_pid_core_names() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("core.4321"), b"x").unwrap();

    let locator = DirCoreLocator;
    let found = locator.find_core("*", temp.path(), 4321).expect("core found");
    assert_eq!(found, temp.path().join("core.4321"));
}

#[test]
fn dir_locator_respects_the_name_pattern() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("core.server-node.77"), b"x").unwrap();

    let locator = DirCoreLocator;
    assert!(locator.find_core("server-node", temp.path(), 77).is_some());
    assert!(locator.find_core("server-master", temp.path(), 77).is_none());
}

#[test]
fn report_serializes_for_harness_diagnostics() {
    let temp = tempfile::tempdir().unwrap();
    let locator = MapLocator { cores: HashMap::new() };
    let report = collect_crashes(&locator, &[1, 2], temp.path(), &[]).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["recovered"].as_array().unwrap().len(), 0);
    assert_eq!(json["warnings"].as_array().unwrap().len(), 0);
}
