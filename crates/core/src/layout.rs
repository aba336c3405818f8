use std::path::{Path, PathBuf};

/// On-disk layout of a cluster workspace.
///
/// This is derived from a chosen root path. It does *not* perform any IO itself;
/// the coordinator and collector are responsible for actually creating
/// directories and files based on this layout.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    /// Root directory of the workspace.
    pub root: PathBuf,
    /// Directory holding one entry per assembled executable (bin).
    pub bin_dir: PathBuf,
    /// Zero-length token file carrying the advisory assembly lock.
    pub lock_path: PathBuf,
    /// Zero-length marker whose existence signals that assembly completed.
    pub prepared_path: PathBuf,
    /// Archive directory for recovered core dumps and preserved binaries.
    pub cores_dir: PathBuf,
}

impl WorkspaceLayout {
    /// Compute the layout for a workspace rooted at `root`.
    ///
    /// This does *not* touch the filesystem.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let bin_dir = root.join("bin");
        let lock_path = root.join("lock");
        let prepared_path = root.join("prepared");
        let cores_dir = root.join("cores");

        Self { root, bin_dir, lock_path, prepared_path, cores_dir }
    }

    /// Path of one assembled entry inside `bin`.
    pub fn bin_entry(&self, entry_name: &str) -> PathBuf {
        self.bin_dir.join(entry_name)
    }
}
