//! Populates a workspace `bin` directory from a manifest.
//!
//! Assembly is reference-only: each entry is a symlink to the resolved source
//! executable, never a copy. It must run against a guaranteed-empty directory;
//! a name collision aborts the attempt and leaves `bin` partially populated,
//! which the coordinator surfaces by never writing the readiness marker.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::manifest::BinaryManifest;
use crate::resolve::{BinaryResolver, ResolveError};

/// Error type for `bin` population.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// A source executable could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// An entry with this name is already present in `bin`.
    #[error("Bin entry already exists: {0}")]
    EntryExists(PathBuf),

    /// Filesystem failure while creating a link.
    #[error("Failed to link {link} -> {target}: {source}")]
    Link {
        link: PathBuf,
        target: PathBuf,
        source: io::Error,
    },
}

/// Create one reference entry per manifest item (and helper) inside `bin_dir`.
///
/// Component entries are named `<prefix>-<logical_name>`; helpers keep their
/// fixed names. No retries: the first failure is returned as-is and earlier
/// links stay in place.
pub fn populate_bin(
    bin_dir: &Path,
    manifest: &BinaryManifest,
    resolver: &BinaryResolver,
) -> Result<(), AssembleError> {
    for entry in &manifest.entries {
        let target = resolver.resolve(&entry.relative_path)?;
        let link = bin_dir.join(manifest.entry_name(&entry.logical_name));
        link_entry(&target, &link)?;
    }

    for helper in &manifest.helpers {
        let target = resolver.resolve(&helper.relative_path)?;
        let link = bin_dir.join(&helper.entry_name);
        link_entry(&target, &link)?;
    }

    Ok(())
}

fn link_entry(target: &Path, link: &Path) -> Result<(), AssembleError> {
    std::os::unix::fs::symlink(target, link).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            AssembleError::EntryExists(link.to_path_buf())
        } else {
            AssembleError::Link {
                link: link.to_path_buf(),
                target: target.to_path_buf(),
                source: e,
            }
        }
    })
}
