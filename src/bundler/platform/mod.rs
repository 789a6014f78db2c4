//! Collaborators invoked by the packaging pipeline.
//!
//! The orchestrator only depends on the traits in this module. Default
//! implementations cover every collaborator so a packager works out of the
//! box; callers replace any of them through the `Packager::with_*` methods.

mod archive;
mod delta;
mod portable;
mod setup;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

pub use archive::ZipArchiver;
pub use delta::{DeltaStats, FileDeltaBuilder, SHASUM_SUFFIX};
pub use portable::{ArchivePortableBuilder, PORTABLE_MARKER_FILE};
pub use setup::{INSTALL_SCRIPT_FILE, ScriptSetupBuilder};

use crate::bundler::{
    Result,
    builder::Progress,
    package::PackageManifest,
    settings::{DeltaMode, TargetOs},
};

/// Produces a compressed artifact from a directory.
///
/// Either writes the whole artifact or leaves nothing at `output`.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Archives every file under `source_dir` into `output`.
    async fn create_archive_from_directory(
        &self,
        output: &Path,
        source_dir: &Path,
        progress: Progress,
    ) -> Result<()>;
}

/// Computes delta packages between two full releases.
#[async_trait]
pub trait DeltaBuilder: Send + Sync {
    /// Writes a delta from `previous` to `new` at `output`.
    ///
    /// # Returns
    ///
    /// The path of the produced artifact and statistics about its contents.
    async fn create_delta_package(
        &self,
        previous: &Path,
        new: &Path,
        output: &Path,
        mode: DeltaMode,
        progress: Progress,
    ) -> Result<(PathBuf, DeltaStats)>;
}

/// Builds the platform installer from a full release.
#[async_trait]
pub trait SetupBuilder: Send + Sync {
    /// Writes the installer for `full_release` to `output`.
    ///
    /// `scratch_dir` is an empty directory owned by this call.
    async fn build_setup(
        &self,
        manifest: &PackageManifest,
        full_release: &Path,
        scratch_dir: &Path,
        output: &Path,
        progress: Progress,
    ) -> Result<()>;
}

/// Builds the portable package from the staged application.
#[async_trait]
pub trait PortableBuilder: Send + Sync {
    /// Writes the portable package for `package_dir` to `output`.
    ///
    /// `scratch_dir` is an empty directory owned by this call.
    async fn build_portable(
        &self,
        manifest: &PackageManifest,
        package_dir: &Path,
        scratch_dir: &Path,
        output: &Path,
        progress: Progress,
    ) -> Result<()>;
}

/// Signs application binaries in place.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs every signable file under `dir` for `os`.
    async fn sign_directory(&self, dir: &Path, os: TargetOs, progress: Progress) -> Result<()>;
}
