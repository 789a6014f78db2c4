//! Target operating systems and runtime identifiers.
//!
//! A runtime identifier names the platform a release is built for, for example
//! `win-x64`, `win10-x64`, `osx.12-arm64` or `linux-x64`. The operating system
//! part is mandatory; the minimum OS version and architecture are optional.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;

use super::Arch;
use crate::bundler::error::{Error, Result};

static RID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<os>win|windows|osx|macos|linux)(?:\.?(?P<ver>\d+(?:\.\d+)*))?(?:-(?P<arch>x64|x86|arm64))?$",
    )
    .expect("runtime identifier pattern is valid")
});

/// Operating system a release targets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum TargetOs {
    /// Microsoft Windows
    Windows,
    /// Apple macOS
    MacOs,
    /// Linux distributions
    Linux,
}

impl TargetOs {
    /// Operating system of the running process.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    /// Short name used in runtime identifiers, file names and default channels.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Windows => "win",
            Self::MacOs => "osx",
            Self::Linux => "linux",
        }
    }

    /// Parses a short or long OS name, ignoring case.
    pub fn from_short_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "win" | "windows" => Some(Self::Windows),
            "osx" | "macos" => Some(Self::MacOs),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }

    /// Whether packaged binaries must be signed before release.
    pub fn requires_signing(self) -> bool {
        matches!(self, Self::Windows | Self::MacOs)
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Windows => "Windows",
            Self::MacOs => "macOS",
            Self::Linux => "Linux",
        })
    }
}

/// Parsed runtime identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RuntimeInfo {
    /// Target operating system
    pub os: TargetOs,
    /// Minimum OS version (`10` in `win10-x64`)
    pub os_min_version: Option<String>,
    /// Target architecture, when specified
    pub arch: Option<Arch>,
    /// Identifier exactly as supplied
    pub identifier: String,
}

impl RuntimeInfo {
    /// Runtime identifier of the running process.
    pub fn current() -> Self {
        let os = TargetOs::current();
        let arch = Arch::current();
        let identifier = match arch {
            Some(arch) => format!("{}-{}", os.short_name(), arch.rid_name()),
            None => os.short_name().to_string(),
        };
        Self {
            os,
            os_min_version: None,
            arch,
            identifier,
        }
    }
}

impl FromStr for RuntimeInfo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let caps = RID_PATTERN
            .captures(trimmed)
            .ok_or_else(|| Error::InvalidRuntime(s.to_string()))?;

        let os = TargetOs::from_short_name(&caps["os"])
            .ok_or_else(|| Error::InvalidRuntime(s.to_string()))?;

        Ok(Self {
            os,
            os_min_version: caps.name("ver").map(|m| m.as_str().to_string()),
            arch: caps.name("arch").and_then(|m| Arch::from_rid(m.as_str())),
            identifier: trimmed.to_string(),
        })
    }
}

impl fmt::Display for RuntimeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}
