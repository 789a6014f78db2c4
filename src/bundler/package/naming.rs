//! Release package file naming.
//!
//! Full releases are named `{id}-{version}-{os}-full.nupkg` and deltas
//! `{id}-{version}-{os}-delta.nupkg`. The version may carry a prerelease
//! (channel) suffix; the OS part may carry a minimum version and architecture.

use std::{path::Path, sync::LazyLock};

use regex::Regex;
use semver::Version;

use crate::bundler::settings::{Arch, TargetOs};

static SUFFIX_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-full\.nupkg$").expect("full suffix pattern is valid"));
static SUFFIX_DELTA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-delta\.nupkg$").expect("delta suffix pattern is valid"));
static VERSION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.-](0|[1-9]\d*)\.(0|[1-9]\d*)($|[^\d])").expect("version start pattern is valid")
});
static RID_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(-(?P<os>osx|win|linux)\.?(?P<ver>[\d.]+)?)?(?:-(?P<arch>x64|x86|arm64))?$")
        .expect("rid suffix pattern is valid")
});

/// File name of a full release.
pub fn full_package_name(id: &str, version: &Version, os: TargetOs) -> String {
    format!("{id}-{version}-{}-full.nupkg", os.short_name())
}

/// File name of a delta release.
pub fn delta_package_name(id: &str, version: &Version, os: TargetOs) -> String {
    format!("{id}-{version}-{}-delta.nupkg", os.short_name())
}

/// Whether release files named after `id` parse back to the same id.
///
/// Fails for ids holding a `-1.2` or `.1.2` segment, which the parser takes
/// for the start of the version.
pub fn is_round_trip_package_id(id: &str) -> bool {
    let name = full_package_name(id, &Version::new(1, 0, 0), TargetOs::Linux);
    parse_package_file_name(&name).is_some_and(|info| info.name == id)
}

/// Components recovered from a release package file name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageFileInfo {
    /// Package id
    pub name: String,
    /// Package version, including any prerelease suffix
    pub version: Version,
    /// Whether this is a delta package
    pub is_delta: bool,
    /// Operating system, when named
    pub os: Option<TargetOs>,
    /// Minimum OS version, when named
    pub os_min_version: Option<String>,
    /// Architecture, when named
    pub arch: Option<Arch>,
}

/// Parses the file name of `path` as a release package name.
pub fn parse_package_file_path(path: &Path) -> Option<PackageFileInfo> {
    parse_package_file_name(path.file_name()?.to_str()?)
}

/// Parses a release package file name, returning `None` for anything that is
/// not a full or delta package with a valid version.
pub fn parse_package_file_name(name: &str) -> Option<PackageFileInfo> {
    let (is_delta, name_and_version) = if SUFFIX_FULL.is_match(name) {
        (false, SUFFIX_FULL.replace(name, ""))
    } else if SUFFIX_DELTA.is_match(name) {
        (true, SUFFIX_DELTA.replace(name, ""))
    } else {
        return None;
    };

    let version_start = VERSION_START.find(&name_and_version)?.start();
    let id = &name_and_version[..version_start];
    let rest = &name_and_version[version_start + 1..];

    let caps = RID_SUFFIX.captures(rest)?;
    let rid_start = caps.get(0).map_or(rest.len(), |m| m.start());
    let version = Version::parse(&rest[..rid_start]).ok()?;

    Some(PackageFileInfo {
        name: id.to_string(),
        version,
        is_delta,
        os: caps
            .name("os")
            .and_then(|m| TargetOs::from_short_name(m.as_str())),
        os_min_version: caps.name("ver").map(|m| m.as_str().to_string()),
        arch: caps.name("arch").and_then(|m| Arch::from_rid(m.as_str())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn builds_names() {
        assert_eq!(
            full_package_name("MyApp", &v("1.0.0-stable"), TargetOs::Linux),
            "MyApp-1.0.0-stable-linux-full.nupkg"
        );
        assert_eq!(
            delta_package_name("MyApp", &v("1.1.0"), TargetOs::Windows),
            "MyApp-1.1.0-win-delta.nupkg"
        );
    }

    #[test]
    fn parses_names_without_rid() {
        let info = parse_package_file_name("Kodegen.Pack-1.0.0-full.nupkg").unwrap();
        assert_eq!(info.name, "Kodegen.Pack");
        assert_eq!(info.version, v("1.0.0"));
        assert!(!info.is_delta);
        assert_eq!(info.os, None);
        assert_eq!(info.arch, None);

        let info = parse_package_file_name("My.Cool-App-1.1.0-delta.nupkg").unwrap();
        assert_eq!(info.name, "My.Cool-App");
        assert_eq!(info.version, v("1.1.0"));
        assert!(info.is_delta);
    }

    #[test]
    fn parses_rid_components() {
        let info = parse_package_file_name("MyApp-1.0.0-osx-full.nupkg").unwrap();
        assert_eq!(info.os, Some(TargetOs::MacOs));

        let info = parse_package_file_name("MyApp-1.0.0-arm64-full.nupkg").unwrap();
        assert_eq!(info.os, None);
        assert_eq!(info.arch, Some(Arch::AArch64));

        let info = parse_package_file_name("MyApp-1.0.0-win10-x64-full.nupkg").unwrap();
        assert_eq!(info.os, Some(TargetOs::Windows));
        assert_eq!(info.os_min_version.as_deref(), Some("10"));
        assert_eq!(info.arch, Some(Arch::X86_64));
    }

    #[test]
    fn keeps_prerelease_in_version() {
        let info = parse_package_file_name("MyApp-1.2.3-beta.22.44-win7-x64-delta.nupkg").unwrap();
        assert_eq!(info.name, "MyApp");
        assert_eq!(info.version, v("1.2.3-beta.22.44"));
        assert!(info.is_delta);
        assert_eq!(info.os_min_version.as_deref(), Some("7"));

        let name = full_package_name("MyApp", &v("1.0.0-stable"), TargetOs::Linux);
        let info = parse_package_file_name(&name).unwrap();
        assert_eq!(info.version, v("1.0.0-stable"));
        assert_eq!(info.os, Some(TargetOs::Linux));
    }

    #[test]
    fn rejects_other_files() {
        assert!(parse_package_file_name("MyApp-1.2.3-win7-x64-full.nupkg.zip").is_none());
        assert!(parse_package_file_name("MyApp-1.2.3-full.zip").is_none());
        assert!(parse_package_file_name("MyApp-1.2.3.nupkg").is_none());
        assert!(parse_package_file_name("MyApp-1.2-full.nupkg").is_none());
        assert!(parse_package_file_name("MyApp-stable-Portable.zip").is_none());
    }

    #[test]
    fn ids_with_version_segments_do_not_round_trip() {
        assert!(is_round_trip_package_id("MyApp"));
        assert!(is_round_trip_package_id("Kodegen.Pack"));
        assert!(is_round_trip_package_id("Tool-2"));
        assert!(is_round_trip_package_id("App-01.2"));
        assert!(!is_round_trip_package_id("Tool-2.0"));
        assert!(!is_round_trip_package_id("App.1.0"));
        assert!(!is_round_trip_package_id("App-1.2.3-beta"));
    }
}
