//! Immutable options for a single packaging run.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use semver::Version;

use super::RuntimeInfo;
use crate::bundler::error::Error;

/// Strategy used when building a delta package.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum DeltaMode {
    /// Do not build delta packages.
    None,
    /// Fast compression of changed files.
    #[default]
    BestSpeed,
    /// Maximum compression of changed files.
    BestSize,
}

impl DeltaMode {
    /// Deflate level used for the delta archive, `None` when deltas are disabled.
    pub fn compression_level(self) -> Option<i64> {
        match self {
            Self::None => None,
            Self::BestSpeed => Some(1),
            Self::BestSize => Some(9),
        }
    }
}

impl FromStr for DeltaMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "none" | "off" | "disabled" => Ok(Self::None),
            "best-speed" | "bestspeed" | "standard" => Ok(Self::BestSpeed),
            "best-size" | "bestsize" => Ok(Self::BestSize),
            other => Err(Error::InvalidOptions(format!(
                "unknown delta mode `{other}` (expected none, best-speed or best-size)"
            ))),
        }
    }
}

impl fmt::Display for DeltaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::BestSpeed => "best-speed",
            Self::BestSize => "best-size",
        })
    }
}

/// Options for one packaging run.
///
/// Constructed through [`PackOptionsBuilder`](super::PackOptionsBuilder), which
/// validates every field and fills in defaults. Never mutated afterwards.
#[derive(Clone, Debug)]
pub struct PackOptions {
    pub(super) runtime: RuntimeInfo,
    pub(super) release_dir: PathBuf,
    pub(super) channel: Option<String>,
    pub(super) delta_mode: DeltaMode,
    pub(super) package_id: String,
    pub(super) title: Option<String>,
    pub(super) description: Option<String>,
    pub(super) authors: Option<String>,
    pub(super) version: Version,
    pub(super) package_dir: PathBuf,
    pub(super) main_exe: String,
    pub(super) release_notes: Option<PathBuf>,
    pub(super) metadata_files: BTreeMap<String, PathBuf>,
}

impl PackOptions {
    /// Target runtime.
    pub fn runtime(&self) -> &RuntimeInfo {
        &self.runtime
    }

    /// Directory receiving release artifacts and the release index.
    pub fn release_dir(&self) -> &Path {
        &self.release_dir
    }

    /// Requested channel, if any.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Delta strategy.
    pub fn delta_mode(&self) -> DeltaMode {
        self.delta_mode
    }

    /// Package identifier.
    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Display title; defaults to the package id.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.package_id)
    }

    /// Description; defaults to the title.
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| self.title())
    }

    /// Authors; defaults to the package id.
    pub fn authors(&self) -> &str {
        self.authors.as_deref().unwrap_or(&self.package_id)
    }

    /// Base version before channel suffixing.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Directory holding the built application files.
    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    /// Main executable, relative to the package directory.
    pub fn main_exe(&self) -> &str {
        &self.main_exe
    }

    /// Release notes file, if any.
    pub fn release_notes(&self) -> Option<&Path> {
        self.release_notes.as_deref()
    }

    /// Files copied verbatim into the release archive root, by archive name.
    pub fn metadata_files(&self) -> &BTreeMap<String, PathBuf> {
        &self.metadata_files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_mode_parses_aliases() {
        assert_eq!("none".parse::<DeltaMode>().unwrap(), DeltaMode::None);
        assert_eq!("BestSpeed".parse::<DeltaMode>().unwrap(), DeltaMode::BestSpeed);
        assert_eq!("best_size".parse::<DeltaMode>().unwrap(), DeltaMode::BestSize);
        assert!("fastest".parse::<DeltaMode>().is_err());
    }

    #[test]
    fn delta_mode_display_parses_back() {
        for mode in [DeltaMode::None, DeltaMode::BestSpeed, DeltaMode::BestSize] {
            assert_eq!(mode.to_string().parse::<DeltaMode>().unwrap(), mode);
        }
    }
}
