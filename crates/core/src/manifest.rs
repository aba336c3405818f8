//! Manifest of executables a workspace must contain.
//!
//! The manifest is fixed at construction time: one `(logical_name,
//! relative_source_path)` pair per cluster component, plus two fixed helper
//! tools that every workspace carries regardless of component set.

use serde::{Deserialize, Serialize};

/// One cluster component executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Logical component name (e.g. "master", "scheduler").
    pub logical_name: String,
    /// Path of the executable relative to the build tree or fixed root.
    pub relative_path: String,
}

/// A fixed auxiliary tool linked into `bin` under its own name, without the
/// component prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperEntry {
    /// Name of the entry created inside `bin`.
    pub entry_name: String,
    /// Path of the executable relative to the build tree or fixed root.
    pub relative_path: String,
}

/// Ordered set of executables to assemble into a workspace `bin` directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryManifest {
    /// Naming prefix for component entries; an entry lands in `bin` as
    /// `<prefix>-<logical_name>`.
    pub prefix: String,
    pub entries: Vec<ManifestEntry>,
    pub helpers: Vec<HelperEntry>,
}

/// Standard components of a local test cluster.
const CLUSTER_PROGRAMS: &[(&str, &str)] = &[
    ("master", "server/master/bin"),
    ("node", "server/node/bin"),
    ("job-proxy", "server/job_proxy/bin"),
    ("exec", "bin/exec"),
    ("proxy", "server/rpc_proxy/bin"),
    ("http-proxy", "server/http_proxy/bin"),
    ("tools", "bin/tools"),
    ("scheduler", "server/scheduler/bin"),
    ("controller-agent", "server/controller_agent/bin"),
];

impl BinaryManifest {
    /// Empty manifest with a given entry-name prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), entries: Vec::new(), helpers: Vec::new() }
    }

    /// The standard cluster manifest: every server component plus the
    /// environment watcher and logrotate helpers.
    pub fn cluster_default() -> Self {
        Self::cluster_with_source_prefix("")
    }

    /// Standard cluster manifest with `source_prefix` prepended to every
    /// relative source path (used when the build tree is nested under a
    /// sub-directory of the lookup root).
    pub fn cluster_with_source_prefix(source_prefix: &str) -> Self {
        let mut manifest = Self::new("server");
        for (name, server_dir) in CLUSTER_PROGRAMS {
            manifest.push_entry(
                *name,
                format!("{}cluster/{}/server-{}", source_prefix, server_dir, name),
            );
        }
        manifest.push_helper("env-watcher", format!("{}environment/bin/env-watcher", source_prefix));
        manifest.push_helper("logrotate", format!("{}tools/logrotate/logrotate", source_prefix));
        manifest
    }

    pub fn push_entry(&mut self, logical_name: impl Into<String>, relative_path: impl Into<String>) {
        self.entries.push(ManifestEntry {
            logical_name: logical_name.into(),
            relative_path: relative_path.into(),
        });
    }

    pub fn push_helper(&mut self, entry_name: impl Into<String>, relative_path: impl Into<String>) {
        self.helpers
            .push(HelperEntry { entry_name: entry_name.into(), relative_path: relative_path.into() });
    }

    /// Name the `bin` entry for a component.
    pub fn entry_name(&self, logical_name: &str) -> String {
        format!("{}-{}", self.prefix, logical_name)
    }

    /// Every entry name the assembled `bin` directory is expected to contain,
    /// components first, then helpers, in manifest order.
    pub fn expected_entry_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| self.entry_name(&e.logical_name))
            .chain(self.helpers.iter().map(|h| h.entry_name.clone()))
            .collect()
    }

    /// Total number of entries assembly will create.
    pub fn len(&self) -> usize {
        self.entries.len() + self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.helpers.is_empty()
    }
}
