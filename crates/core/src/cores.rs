//! Best-effort postmortem capture of core dumps left by crashed cluster
//! processes.
//!
//! Collection never fails on a per-artifact basis: a core that cannot be
//! relocated (foreign owner, cross-filesystem move, permissions) is recorded
//! as a warning and skipped. Only failure to create the archive directory
//! itself aborts a collection call.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSetBuilder};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::layout::WorkspaceLayout;

/// Error type for crash collection. Per-artifact failures are reported as
/// [`RecoveryWarning`]s inside the [`CollectReport`] instead.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The `cores` archive directory could not be created.
    #[error("Failed to create archive directory {path}: {source}")]
    ArchiveDir { path: PathBuf, source: io::Error },
}

/// External core-dump lookup service.
///
/// `name_pattern` is a glob over the crashed executable's name; callers with
/// no reliable name filter pass `"*"`. Matching is by process working
/// directory and pid.
pub trait CoreDumpLocator: Send + Sync {
    fn find_core(&self, name_pattern: &str, working_directory: &Path, pid: u32) -> Option<PathBuf>;
}

/// One recovered core dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreArtifact {
    pub pid: u32,
    /// Where the locator found the core.
    pub original_path: PathBuf,
    /// Where it now lives inside the archive directory.
    pub archived_path: PathBuf,
}

/// A non-fatal failure during collection (relocation or binary-copy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryWarning {
    pub path: PathBuf,
    pub detail: String,
}

/// Outcome of one collection call. Warnings are carried here rather than
/// raised, so a collection call is structurally incapable of throwing on
/// individual artifacts.
#[derive(Debug, Default, Serialize)]
pub struct CollectReport {
    pub recovered: Vec<CoreArtifact>,
    pub warnings: Vec<RecoveryWarning>,
}

impl CollectReport {
    fn warn(&mut self, path: &Path, detail: impl Into<String>) {
        let detail = detail.into();
        warn!(path = %path.display(), detail = %detail, "crash recovery warning");
        self.warnings.push(RecoveryWarning { path: path.to_path_buf(), detail });
    }
}

/// Recover core dumps for `pids` out of `working_directory` into its `cores`
/// archive, preserving a copy of every binary in `binaries` alongside them
/// when any core was found.
///
/// The binary copies exist for offline symbol resolution, so finding a core
/// is enough to trigger them even if its relocation then failed (a foreign
/// core that cannot be moved still names the crash). When no core is found
/// for any pid the copy step is skipped entirely.
pub fn collect_crashes(
    locator: &dyn CoreDumpLocator,
    pids: &[u32],
    working_directory: &Path,
    binaries: &[PathBuf],
) -> Result<CollectReport, CollectError> {
    let cores_dir = WorkspaceLayout::new(working_directory).cores_dir;
    fs::create_dir_all(&cores_dir)
        .map_err(|e| CollectError::ArchiveDir { path: cores_dir.clone(), source: e })?;

    let mut report = CollectReport::default();
    let mut core_found = false;

    for &pid in pids {
        // No reliable executable-name filter is available for these pids, so
        // match any name.
        let Some(core_file) = locator.find_core("*", working_directory, pid) else {
            continue;
        };
        core_found = true;
        info!(pid, core = %core_file.display(), "core file found");
        match move_into(&core_file, &cores_dir) {
            Ok(archived_path) => {
                report.recovered.push(CoreArtifact {
                    pid,
                    original_path: core_file,
                    archived_path,
                });
            }
            // Foreign cores and cross-filesystem moves land here; keep going.
            Err(e) => report.warn(&core_file, format!("failed to relocate core: {e}")),
        }
    }

    if !core_found {
        debug!(
            working_directory = %working_directory.display(),
            ?pids,
            "no core files found"
        );
        return Ok(report);
    }

    for binary in binaries {
        let dest = match binary.file_name() {
            Some(name) => cores_dir.join(name),
            None => {
                report.warn(binary, "binary path has no file name");
                continue;
            }
        };
        if let Err(e) = fs::copy(binary, &dest) {
            report.warn(binary, format!("failed to preserve binary: {e}"));
        }
    }

    Ok(report)
}

/// Move `src` into `dest_dir`, keeping its file name. Falls back to
/// copy-then-unlink when a plain rename is refused (cross-filesystem moves).
///
/// A copy that lands but whose source then cannot be unlinked still counts
/// as success: the archive holds a complete artifact, only the stale source
/// lingers.
fn move_into(src: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
    let file_name = src
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "core file has no file name"))?;
    let dest = dest_dir.join(file_name);
    if fs::rename(src, &dest).is_ok() {
        return Ok(dest);
    }
    fs::copy(src, &dest)?;
    if let Err(e) = fs::remove_file(src) {
        warn!(path = %src.display(), error = %e, "archived core copied but source not unlinked");
    }
    Ok(dest)
}

/// Filesystem-scanning [`CoreDumpLocator`] for hosts where cores land next to
/// the process working directory under kernel-style names
/// (`core.<exe>.<pid>`, `core.<pid>`, optionally suffixed).
///
/// Stands in for an external locator when none is wired up.
#[derive(Debug, Default)]
pub struct DirCoreLocator;

impl CoreDumpLocator for DirCoreLocator {
    fn find_core(&self, name_pattern: &str, working_directory: &Path, pid: u32) -> Option<PathBuf> {
        let patterns = [
            format!("core.{name_pattern}.{pid}"),
            format!("core.{name_pattern}.{pid}.*"),
            format!("core.{pid}"),
            format!("{name_pattern}.{pid}.core"),
        ];
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            builder.add(Glob::new(pattern).ok()?);
        }
        let set = builder.build().ok()?;

        for entry in fs::read_dir(working_directory).ok()?.flatten() {
            let name = entry.file_name();
            if set.is_match(Path::new(&name)) {
                return Some(entry.path());
            }
        }
        None
    }
}
