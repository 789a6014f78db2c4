//! Per-run state shared by every pipeline stage.

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use semver::Version;

use super::PendingCommit;
use crate::bundler::{
    package::{PackageManifest, delta_package_name, full_package_name},
    settings::PackOptions,
};

/// Values fixed when a run is validated and read by every stage.
///
/// Owned by the orchestrator for one run and shared with concurrently
/// running branches behind an `Arc`.
#[derive(Debug)]
pub struct RunContext {
    options: PackOptions,
    channel: String,
    version: Version,
    manifest: PackageManifest,
    staging_dir: PathBuf,
    release_dir_existed: bool,
    pending: PendingCommit,
    committed: AtomicBool,
}

impl RunContext {
    /// Creates the context for a validated run.
    pub fn new(
        options: PackOptions,
        channel: String,
        version: Version,
        manifest: PackageManifest,
        staging_dir: PathBuf,
        release_dir_existed: bool,
    ) -> Self {
        Self {
            options,
            channel,
            version,
            manifest,
            staging_dir,
            release_dir_existed,
            pending: PendingCommit::new(),
            committed: AtomicBool::new(false),
        }
    }

    /// Options for this run.
    pub fn options(&self) -> &PackOptions {
        &self.options
    }

    /// Resolved channel.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Resolved (channel-suffixed) version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Package manifest.
    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    /// Root of the run's staging area.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Staging subdirectory reserved for one stage.
    pub fn staging_subdir(&self, name: &str) -> PathBuf {
        self.staging_dir.join(name)
    }

    /// Whether the release directory existed before this run.
    pub fn release_dir_existed(&self) -> bool {
        self.release_dir_existed
    }

    /// Outputs awaiting the commit point.
    pub fn pending(&self) -> &PendingCommit {
        &self.pending
    }

    /// Records that the release feed was saved; the run can no longer be
    /// rolled back.
    pub fn mark_committed(&self) {
        self.committed.store(true, Ordering::SeqCst);
    }

    /// Whether the commit point was passed.
    pub fn is_committed(&self) -> bool {
        self.committed.load(Ordering::SeqCst)
    }

    /// Final path of the full release.
    pub fn full_release_path(&self) -> PathBuf {
        self.options.release_dir().join(full_package_name(
            self.options.package_id(),
            &self.version,
            self.options.runtime().os,
        ))
    }

    /// Final path of the delta release.
    pub fn delta_release_path(&self) -> PathBuf {
        self.options.release_dir().join(delta_package_name(
            self.options.package_id(),
            &self.version,
            self.options.runtime().os,
        ))
    }
}
