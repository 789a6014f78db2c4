//! Channel and version resolution.

use std::sync::LazyLock;

use regex::Regex;
use semver::{Prerelease, Version};

use super::{ReleaseIndex, ReleaseRecord};
use crate::bundler::{
    error::{Error, Result},
    settings::TargetOs,
};

static CHANNEL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("channel pattern is valid")
});

/// Channel used when none is requested: the OS short name.
pub fn default_channel(os: TargetOs) -> &'static str {
    os.short_name()
}

/// Fails if `channel` is not a valid channel name.
pub fn validate_channel_name(channel: &str) -> Result<()> {
    if CHANNEL_NAME.is_match(channel) {
        Ok(())
    } else {
        Err(Error::InvalidChannel {
            channel: channel.to_string(),
            reason: "channel names may only contain letters, digits, '.', '_' and '-'".into(),
        })
    }
}

/// Returns the requested channel, or the default for `os`.
pub fn resolve_channel(requested: Option<&str>, os: TargetOs) -> Result<String> {
    match requested.map(str::trim).filter(|c| !c.is_empty()) {
        Some(channel) => {
            validate_channel_name(channel)?;
            Ok(channel.to_string())
        }
        None => Ok(default_channel(os).to_string()),
    }
}

/// Computes the package version for `channel`.
///
/// The default channel keeps `base` unchanged. Other channels become the
/// prerelease tag: `1.0.0` in `beta` is `1.0.0-beta`, and `1.0.0-rc.1` in
/// `beta` is `1.0.0-rc.1.beta`. Build metadata is preserved.
///
/// Pure: the same inputs always produce the same version.
pub fn resolve_version(base: &Version, os: TargetOs, channel: &str) -> Result<Version> {
    if channel.eq_ignore_ascii_case(default_channel(os)) {
        return Ok(base.clone());
    }

    let tag = if base.pre.is_empty() {
        channel.to_string()
    } else {
        format!("{}.{}", base.pre, channel)
    };
    let pre = Prerelease::new(&tag).map_err(|e| Error::InvalidChannel {
        channel: channel.to_string(),
        reason: format!("`{tag}` is not a valid prerelease: {e}"),
    })?;

    Ok(Version {
        pre,
        ..base.clone()
    })
}

/// Asks the index for the full release a delta of `version` should diff against.
pub async fn find_previous_full(
    index: &dyn ReleaseIndex,
    package_id: &str,
    version: &Version,
    channel: &str,
) -> Result<Option<ReleaseRecord>> {
    index.previous_full_release(package_id, version, channel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn default_channel_keeps_version() {
        assert_eq!(
            resolve_version(&v("1.2.3"), TargetOs::Windows, "win").unwrap(),
            v("1.2.3")
        );
        assert_eq!(
            resolve_version(&v("1.2.3"), TargetOs::Linux, "LINUX").unwrap(),
            v("1.2.3")
        );
    }

    #[test]
    fn other_channels_become_prerelease() {
        assert_eq!(
            resolve_version(&v("1.0.0"), TargetOs::Linux, "stable").unwrap(),
            v("1.0.0-stable")
        );
        assert_eq!(
            resolve_version(&v("1.0.0-rc.1+build.5"), TargetOs::MacOs, "beta").unwrap(),
            v("1.0.0-rc.1.beta+build.5")
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        for (base, os, channel) in [
            ("1.0.0", TargetOs::Linux, "stable"),
            ("2.1.0-alpha", TargetOs::Windows, "nightly"),
            ("0.9.9", TargetOs::MacOs, "osx"),
        ] {
            let first = resolve_version(&v(base), os, channel).unwrap();
            for _ in 0..3 {
                assert_eq!(resolve_version(&v(base), os, channel).unwrap(), first);
            }
        }
    }

    #[test]
    fn invalid_channels_are_rejected() {
        assert!(matches!(
            resolve_channel(Some("my channel"), TargetOs::Linux),
            Err(Error::InvalidChannel { .. })
        ));
        assert!(matches!(
            resolve_version(&v("1.0.0"), TargetOs::Linux, "a..b"),
            Err(Error::InvalidChannel { .. })
        ));
    }

    #[test]
    fn missing_channel_uses_os_default() {
        assert_eq!(resolve_channel(None, TargetOs::MacOs).unwrap(), "osx");
        assert_eq!(resolve_channel(Some("  "), TargetOs::Windows).unwrap(), "win");
        assert_eq!(resolve_channel(Some("beta"), TargetOs::Windows).unwrap(), "beta");
    }
}
