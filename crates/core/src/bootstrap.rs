//! Exactly-once workspace assembly shared across unrelated OS processes.
//!
//! Many independently launched test workers on one machine may race to stand up
//! the same workspace. There is no shared in-memory primitive between them, so
//! coordination is filesystem-mediated: an advisory exclusive lock on a
//! dedicated `lock` file elects the single assembler, and a separate `prepared`
//! marker file publishes completion so losers can passively poll instead of
//! contending on the lock. The lock file is never reused as the readiness
//! signal; its held state is not observable without attempting acquisition.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::assemble::{populate_bin, AssembleError};
use crate::layout::WorkspaceLayout;
use crate::manifest::BinaryManifest;
use crate::resolve::BinaryResolver;

/// Interval between readiness-marker checks for callers that lost the lock
/// race. No backoff, no timeout: callers needing bounded latency must impose
/// an external deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Error type for workspace preparation. Only the assembling caller can fail;
/// waiting callers block until the marker appears.
#[derive(Debug, Error)]
pub enum PrepareError {
    /// The workspace root could not be created.
    #[error("Failed to create workspace {path}: {source}")]
    Workspace { path: PathBuf, source: io::Error },

    /// The lock file could not be opened or the lock attempt itself errored.
    #[error("Failed to acquire assembly lock at {path}: {source}")]
    Lock { path: PathBuf, source: io::Error },

    /// The `bin` directory could not be created or reset.
    #[error("Failed to set up bin directory {path}: {source}")]
    BinDir { path: PathBuf, source: io::Error },

    /// Assembly itself failed; `bin` may be partially populated and the
    /// readiness marker stays absent.
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    /// The readiness marker could not be written.
    #[error("Failed to write readiness marker {path}: {source}")]
    Marker { path: PathBuf, source: io::Error },
}

/// What a lock winner does when `bin` already exists.
///
/// A previous assembler may have crashed after creating `bin` but before
/// writing the readiness marker, leaving a partially populated directory
/// behind. The policy decides whether that directory is trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingBinPolicy {
    /// Skip assembly whenever `bin` exists, complete or not, and publish the
    /// marker over it. Cheap, but inherits whatever a crashed predecessor
    /// left behind.
    #[default]
    Trust,
    /// Check that every manifest entry is present; if any is missing, remove
    /// `bin` and re-assemble from scratch before publishing the marker.
    Revalidate,
}

/// Prepare a workspace at `destination`, assembling `bin` exactly once across
/// arbitrarily many concurrent callers, and return the `bin` path.
///
/// The winner of the lock race performs assembly and writes the `prepared`
/// marker; every other caller sleeps until the marker appears. The lock is
/// deliberately held until process exit, so the assembler identity persists
/// for the workspace's setup phase without blocking readers.
///
/// Uses [`ExistingBinPolicy::Trust`]; see [`prepare_with_policy`].
pub fn prepare(
    destination: &Path,
    manifest: &BinaryManifest,
    resolver: &BinaryResolver,
) -> Result<PathBuf, PrepareError> {
    prepare_with_policy(destination, manifest, resolver, ExistingBinPolicy::Trust)
}

/// [`prepare`] with an explicit policy for pre-existing `bin` directories.
pub fn prepare_with_policy(
    destination: &Path,
    manifest: &BinaryManifest,
    resolver: &BinaryResolver,
    policy: ExistingBinPolicy,
) -> Result<PathBuf, PrepareError> {
    let layout = WorkspaceLayout::new(destination);

    fs::create_dir_all(&layout.root)
        .map_err(|e| PrepareError::Workspace { path: layout.root.clone(), source: e })?;

    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&layout.lock_path)
        .map_err(|e| PrepareError::Lock { path: layout.lock_path.clone(), source: e })?;

    let acquired = try_flock_exclusive(&lock_file)
        .map_err(|e| PrepareError::Lock { path: layout.lock_path.clone(), source: e })?;

    if !acquired {
        debug!(
            workspace = %layout.root.display(),
            "assembly lock held elsewhere, polling for readiness marker"
        );
        while !layout.prepared_path.exists() {
            thread::sleep(POLL_INTERVAL);
        }
        return Ok(layout.bin_dir);
    }

    debug!(workspace = %layout.root.display(), ?policy, "won assembly lock");

    if !layout.bin_dir.exists() {
        fs::create_dir_all(&layout.bin_dir)
            .map_err(|e| PrepareError::BinDir { path: layout.bin_dir.clone(), source: e })?;
        populate_bin(&layout.bin_dir, manifest, resolver)?;
    } else if policy == ExistingBinPolicy::Revalidate && !bin_is_complete(&layout, manifest) {
        debug!(bin = %layout.bin_dir.display(), "existing bin directory is incomplete, re-assembling");
        fs::remove_dir_all(&layout.bin_dir)
            .map_err(|e| PrepareError::BinDir { path: layout.bin_dir.clone(), source: e })?;
        fs::create_dir_all(&layout.bin_dir)
            .map_err(|e| PrepareError::BinDir { path: layout.bin_dir.clone(), source: e })?;
        populate_bin(&layout.bin_dir, manifest, resolver)?;
    }

    // Publish readiness only after bin is fully populated; observers of the
    // marker get a happens-before edge on the directory contents.
    File::create(&layout.prepared_path)
        .map_err(|e| PrepareError::Marker { path: layout.prepared_path.clone(), source: e })?;

    // The lock descriptor stays open for the life of the process so the
    // assembler identity survives the return. The OS releases it on exit.
    std::mem::forget(lock_file);

    Ok(layout.bin_dir)
}

/// Every expected entry is present in `bin`. Checked with `symlink_metadata`
/// so dangling links still count as present; assembly never verified targets
/// in the first place.
fn bin_is_complete(layout: &WorkspaceLayout, manifest: &BinaryManifest) -> bool {
    manifest
        .expected_entry_names()
        .iter()
        .all(|name| fs::symlink_metadata(layout.bin_entry(name)).is_ok())
}

/// Try to acquire an exclusive flock on a file (non-blocking).
///
/// Returns `Ok(true)` if the lock was acquired, `Ok(false)` if it is already
/// held by another process (or another descriptor in this one).
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    // SAFETY: flock is a standard POSIX call; fd is a valid descriptor
    // owned by `file` for the duration of the call.
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}
