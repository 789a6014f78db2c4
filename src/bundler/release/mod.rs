//! Release index: records of published releases per channel.
//!
//! The orchestrator talks to the index only through [`ReleaseIndex`].
//! [`LocalReleaseIndex`] stores one JSON feed per channel in the release
//! directory.

mod local;
pub mod resolver;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};

pub use local::{LocalReleaseIndex, ReleaseFeed, feed_file_name};
pub use resolver::{default_channel, find_previous_full, resolve_channel, resolve_version};

use crate::bundler::{Result, settings::RuntimeInfo};

/// Kind of release artifact.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ReleaseKind {
    /// Complete release
    Full,
    /// Patch against the previous full release
    Delta,
}

/// A release registered with the index.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRecord {
    /// Package id
    pub package_id: String,
    /// Release version
    pub version: Version,
    /// Full or delta
    #[serde(rename = "type")]
    pub kind: ReleaseKind,
    /// File name in the release directory
    pub file_name: String,
    /// Hex SHA-256 of the file
    pub sha256: String,
    /// File size in bytes
    pub size: u64,
}

/// Persistent record of releases, consulted to order versions and find delta bases.
///
/// Implementations must tolerate concurrent calls from the full release and
/// delta stages.
#[async_trait]
pub trait ReleaseIndex: Send + Sync {
    /// Fails if `version` of `package_id` cannot be packaged into `channel`
    /// for `runtime`.
    async fn validate_channel_for_packaging(
        &self,
        package_id: &str,
        version: &Version,
        channel: &str,
        runtime: &RuntimeInfo,
    ) -> Result<()>;

    /// Latest full release of `package_id` in `channel` older than `version`.
    async fn previous_full_release(
        &self,
        package_id: &str,
        version: &Version,
        channel: &str,
    ) -> Result<Option<ReleaseRecord>>;

    /// Final path of the portable package.
    fn suggested_portable_path(&self, id: &str, channel: &str, runtime: &RuntimeInfo) -> PathBuf;

    /// Final path of the setup package.
    fn suggested_setup_path(&self, id: &str, channel: &str, runtime: &RuntimeInfo) -> PathBuf;

    /// Registers the release artifact at `path` in `channel`.
    async fn add_new_release(&self, path: &Path, channel: &str) -> Result<ReleaseRecord>;

    /// Persists every channel touched during this run.
    async fn save_releases_files(&self) -> Result<()>;

    /// Undoes every registration made during this run.
    async fn rollback_new_releases(&self) -> Result<()>;
}
