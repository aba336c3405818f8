//! testbed-core
//!
//! Bootstrap coordination and crash-artifact collection for local
//! multi-process test clusters.
//!
//! Many independently launched test workers on one machine share a single
//! assembled workspace of cluster binaries. This crate guarantees that
//! exactly one process performs the assembly (advisory file lock plus a
//! readiness marker that latecomers poll), and recovers core dumps after a
//! run, best-effort, without ever failing on an individual artifact.
//!
//! The cluster's server binaries, the job-submission client, and the test
//! harness itself are external collaborators; this crate only locates,
//! links, and archives.

// The exactly-once guarantee rests on advisory flock semantics; there is no
// degraded mode without them.
#[cfg(not(unix))]
compile_error!("testbed-core requires unix advisory file locks (flock)");

pub mod assemble;
pub mod bootstrap;
pub mod cores;
pub mod layout;
pub mod manifest;
pub mod resolve;

pub use assemble::{populate_bin, AssembleError};
pub use bootstrap::{prepare, prepare_with_policy, ExistingBinPolicy, PrepareError};
pub use cores::{collect_crashes, CollectError, CollectReport, CoreDumpLocator, DirCoreLocator};
pub use layout::WorkspaceLayout;
pub use manifest::BinaryManifest;
pub use resolve::{ArtifactLocator, BinaryResolver, ResolveError};

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for harnesses to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
