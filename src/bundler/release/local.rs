//! File-backed release index.
//!
//! Each channel has a feed `releases.{channel}.json` in the release
//! directory:
//!
//! ```json
//! {
//!   "assets": [
//!     { "packageId": "MyApp", "version": "1.0.0", "type": "Full",
//!       "fileName": "MyApp-1.0.0-linux-full.nupkg", "sha256": "…", "size": 1024 }
//!   ],
//!   "updatedAt": "2026-01-01T00:00:00Z"
//! }
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{ReleaseIndex, ReleaseKind, ReleaseRecord, resolver::validate_channel_name};
use crate::bundler::{
    builder::{calculate_sha256, incomplete_path},
    error::{Error, ErrorExt, Result},
    package::parse_package_file_name,
    settings::RuntimeInfo,
    utils::fs,
};

/// Feed file name for `channel`.
pub fn feed_file_name(channel: &str) -> String {
    format!("releases.{channel}.json")
}

/// Releases published in one channel.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseFeed {
    /// Registered artifacts
    #[serde(default)]
    pub assets: Vec<ReleaseRecord>,
    /// Last time the feed was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReleaseFeed {
    /// Full releases in the feed.
    pub fn full_releases(&self) -> impl Iterator<Item = &ReleaseRecord> {
        self.assets.iter().filter(|r| r.kind == ReleaseKind::Full)
    }

    /// Newest full release of `package_id`.
    pub fn latest_full(&self, package_id: &str) -> Option<&ReleaseRecord> {
        self.full_releases()
            .filter(|r| r.package_id == package_id)
            .max_by(|a, b| a.version.cmp(&b.version))
    }
}

#[derive(Debug, Default)]
struct IndexState {
    feeds: BTreeMap<String, ReleaseFeed>,
    touched: BTreeSet<String>,
    new_releases: Vec<(String, ReleaseRecord)>,
}

/// Release index stored as JSON feeds in the release directory.
///
/// Registrations are serialized behind an async mutex and kept in memory
/// until [`save_releases_files`](ReleaseIndex::save_releases_files).
#[derive(Debug)]
pub struct LocalReleaseIndex {
    release_dir: PathBuf,
    state: Mutex<IndexState>,
}

impl LocalReleaseIndex {
    /// Creates an index over `release_dir`. Nothing is read until first use.
    pub fn new(release_dir: impl Into<PathBuf>) -> Self {
        Self {
            release_dir: release_dir.into(),
            state: Mutex::new(IndexState::default()),
        }
    }

    /// Directory holding the feeds and artifacts.
    pub fn release_dir(&self) -> &Path {
        &self.release_dir
    }

    /// Reads the persisted feed for `channel`; a missing file is an empty feed.
    pub async fn load_feed(&self, channel: &str) -> Result<ReleaseFeed> {
        let path = self.release_dir.join(feed_file_name(channel));
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ReleaseFeed::default()),
            Err(error) => Err(Error::Fs {
                context: "reading release feed",
                path,
                error,
            }),
        }
    }

    async fn cached_feed<'a>(
        &self,
        state: &'a mut IndexState,
        channel: &str,
    ) -> Result<&'a mut ReleaseFeed> {
        if !state.feeds.contains_key(channel) {
            let feed = self.load_feed(channel).await?;
            state.feeds.insert(channel.to_string(), feed);
        }
        state
            .feeds
            .get_mut(channel)
            .ok_or_else(|| Error::GenericError(format!("feed for channel `{channel}` missing")))
    }

    fn suggested_path(&self, id: &str, channel: &str, suffix: &str) -> PathBuf {
        self.release_dir.join(format!("{id}-{channel}-{suffix}"))
    }
}

#[async_trait]
impl ReleaseIndex for LocalReleaseIndex {
    async fn validate_channel_for_packaging(
        &self,
        package_id: &str,
        version: &Version,
        channel: &str,
        runtime: &RuntimeInfo,
    ) -> Result<()> {
        validate_channel_name(channel)?;

        let mut state = self.state.lock().await;
        let feed = self.cached_feed(&mut state, channel).await?;

        let foreign = feed
            .assets
            .iter()
            .filter_map(|r| parse_package_file_name(&r.file_name).and_then(|info| info.os))
            .find(|os| *os != runtime.os);
        if let Some(os) = foreign {
            return Err(Error::InvalidChannel {
                channel: channel.to_string(),
                reason: format!(
                    "it already holds {os} releases; use a separate channel per operating system"
                ),
            });
        }

        if let Some(latest) = feed.latest_full(package_id).filter(|r| r.version >= *version) {
            return Err(Error::VersionNotNewer {
                version: version.clone(),
                latest: latest.version.clone(),
                channel: channel.to_string(),
            });
        }

        Ok(())
    }

    async fn previous_full_release(
        &self,
        package_id: &str,
        version: &Version,
        channel: &str,
    ) -> Result<Option<ReleaseRecord>> {
        let mut state = self.state.lock().await;
        let feed = self.cached_feed(&mut state, channel).await?;
        Ok(feed
            .full_releases()
            .filter(|r| r.package_id == package_id && r.version < *version)
            .max_by(|a, b| a.version.cmp(&b.version))
            .cloned())
    }

    fn suggested_portable_path(&self, id: &str, channel: &str, _runtime: &RuntimeInfo) -> PathBuf {
        self.suggested_path(id, channel, "Portable.zip")
    }

    fn suggested_setup_path(&self, id: &str, channel: &str, _runtime: &RuntimeInfo) -> PathBuf {
        self.suggested_path(id, channel, "Setup.tar.gz")
    }

    async fn add_new_release(&self, path: &Path, channel: &str) -> Result<ReleaseRecord> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::GenericError(format!("invalid release path {}", path.display())))?
            .to_string();
        let info = parse_package_file_name(&file_name).ok_or_else(|| {
            Error::GenericError(format!("{file_name} is not a release package file name"))
        })?;
        let (sha256, size) = calculate_sha256(path).await?;

        let record = ReleaseRecord {
            package_id: info.name,
            version: info.version,
            kind: if info.is_delta {
                ReleaseKind::Delta
            } else {
                ReleaseKind::Full
            },
            file_name,
            sha256,
            size,
        };

        let mut state = self.state.lock().await;
        let feed = self.cached_feed(&mut state, channel).await?;
        feed.assets.retain(|r| r.file_name != record.file_name);
        feed.assets.push(record.clone());
        state.touched.insert(channel.to_string());
        state
            .new_releases
            .push((channel.to_string(), record.clone()));

        log::debug!("Registered {} in channel {}", record.file_name, channel);
        Ok(record)
    }

    async fn save_releases_files(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let touched: Vec<String> = state.touched.iter().cloned().collect();

        for channel in touched {
            let Some(feed) = state.feeds.get_mut(&channel) else {
                continue;
            };
            feed.updated_at = Some(Utc::now());
            let json = serde_json::to_string_pretty(feed)?;

            let path = self.release_dir.join(feed_file_name(&channel));
            let temp = incomplete_path(&path);
            let written = match tokio::fs::write(&temp, json).await {
                Ok(()) => tokio::fs::rename(&temp, &path)
                    .await
                    .fs_context("committing release feed", &path),
                Err(error) => Err(Error::Fs {
                    context: "writing release feed",
                    path: temp.clone(),
                    error,
                }),
            };
            if let Err(e) = written {
                fs::remove_file_if_exists(&temp).await.ok();
                return Err(e);
            }
            log::info!("✓ Saved release feed: {}", path.display());
        }

        state.touched.clear();
        state.new_releases.clear();
        Ok(())
    }

    async fn rollback_new_releases(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let new_releases = std::mem::take(&mut state.new_releases);

        for (channel, record) in new_releases.iter().rev() {
            if let Some(feed) = state.feeds.get_mut(channel) {
                feed.assets.retain(|r| r.file_name != record.file_name);
            }
            let path = self.release_dir.join(&record.file_name);
            if let Err(e) = fs::remove_file_if_exists(&path).await {
                log::warn!("Failed to remove {} during rollback: {}", path.display(), e);
            } else {
                log::debug!("Rolled back {}", record.file_name);
            }
        }

        let touched = std::mem::take(&mut state.touched);
        for channel in touched {
            state.feeds.remove(&channel);
        }
        Ok(())
    }
}
