//! Mapping from manifest-relative source paths to absolute executable paths.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error type for executable resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The build-artifact locator has no artifact at the given relative path.
    #[error("Build artifact not found: {0}")]
    MissingArtifact(String),
}

/// External build-artifact lookup service.
///
/// Maps a path relative to the build tree to an absolute on-disk path, failing
/// if the artifact does not exist. Implemented outside this crate by whatever
/// build system hosts the test run.
pub trait ArtifactLocator: Send + Sync {
    fn locate(&self, relative_path: &str) -> Result<PathBuf, ResolveError>;
}

/// Resolves logical source paths to absolute executable paths.
///
/// Two mutually exclusive modes: delegate to an [`ArtifactLocator`], or join
/// against a fixed root directory. Pure mapping, no side effects; fixed-root
/// mode performs no existence check (deferred to link-creation time).
pub enum BinaryResolver {
    Locator(Box<dyn ArtifactLocator>),
    FixedRoot(PathBuf),
}

impl BinaryResolver {
    pub fn locator(locator: impl ArtifactLocator + 'static) -> Self {
        Self::Locator(Box::new(locator))
    }

    pub fn fixed_root(root: impl AsRef<Path>) -> Self {
        Self::FixedRoot(root.as_ref().to_path_buf())
    }

    /// Absolute path of the executable behind `relative_path`.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, ResolveError> {
        match self {
            Self::Locator(locator) => locator.locate(relative_path),
            Self::FixedRoot(root) => Ok(root.join(relative_path)),
        }
    }
}

impl std::fmt::Debug for BinaryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locator(_) => f.write_str("BinaryResolver::Locator"),
            Self::FixedRoot(root) => f.debug_tuple("BinaryResolver::FixedRoot").field(root).finish(),
        }
    }
}
