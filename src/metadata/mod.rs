//! Packaging configuration loaded from `kodegen-pack.toml`.
//!
//! Every command line option has a kebab-case key:
//!
//! ```toml
//! pack-id = "MyApp"
//! pack-version = "1.2.0"
//! pack-dir = "target/release/app"
//! output = "Releases"
//! channel = "beta"
//! delta = "best-size"
//! release-notes = "CHANGELOG.md"
//! sign-template = "signtool sign /a {{file}}"
//! ```
//!
//! Relative paths resolve against the directory holding the file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "kodegen-pack.toml";

/// Values read from a configuration file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PackConfig {
    /// Package id
    pub pack_id: Option<String>,
    /// Base semantic version
    pub pack_version: Option<String>,
    /// Directory holding the built application
    pub pack_dir: Option<PathBuf>,
    /// Release directory
    pub output: Option<PathBuf>,
    /// Release channel
    pub channel: Option<String>,
    /// Runtime identifier
    pub runtime: Option<String>,
    /// Delta mode (`none`, `best-speed`, `best-size`)
    pub delta: Option<String>,
    /// Display title
    pub pack_title: Option<String>,
    /// Authors
    pub pack_authors: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Main executable, relative to `pack-dir`
    pub main_exe: Option<String>,
    /// Markdown release notes
    pub release_notes: Option<PathBuf>,
    /// Setup splash image
    pub splash_image: Option<PathBuf>,
    /// Application icon
    pub icon: Option<PathBuf>,
    /// Command template run for each signable file
    pub sign_template: Option<String>,
}

impl PackConfig {
    /// Parses configuration text, resolving relative paths against `base_dir`.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(text)?;
        for path in [
            &mut config.pack_dir,
            &mut config.output,
            &mut config.release_notes,
            &mut config.splash_image,
            &mut config.icon,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
        Ok(config)
    }
}

/// Loads a configuration file.
pub fn load_pack_config(path: &Path) -> anyhow::Result<PackConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    PackConfig::parse(&text, base_dir)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Loads `kodegen-pack.toml` from `dir` if present.
pub fn discover_pack_config(dir: &Path) -> anyhow::Result<Option<PackConfig>> {
    let path = dir.join(DEFAULT_CONFIG_FILE);
    if !path.is_file() {
        log::debug!("No {} in {}", DEFAULT_CONFIG_FILE, dir.display());
        return Ok(None);
    }
    log::info!("Using configuration from {}", path.display());
    load_pack_config(&path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let config = PackConfig::parse(
            r#"
pack-id = "MyApp"
pack-version = "1.0.0"
pack-dir = "build/app"
output = "/abs/Releases"
icon = "assets/icon.png"
"#,
            Path::new("/work"),
        )
        .unwrap();

        assert_eq!(config.pack_id.as_deref(), Some("MyApp"));
        assert_eq!(config.pack_dir, Some(PathBuf::from("/work/build/app")));
        assert_eq!(config.output, Some(PathBuf::from("/abs/Releases")));
        assert_eq!(config.icon, Some(PathBuf::from("/work/assets/icon.png")));
        assert_eq!(config.release_notes, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PackConfig::parse("pack_id = \"MyApp\"", Path::new(".")).is_err());
    }

    #[test]
    fn discovery_finds_default_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_pack_config(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "channel = \"beta\"\ndelta = \"none\"\n",
        )
        .unwrap();
        let config = discover_pack_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.channel.as_deref(), Some("beta"));
        assert_eq!(config.delta.as_deref(), Some("none"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_pack_config(Path::new("/nonexistent/kodegen-pack.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/kodegen-pack.toml"));
    }
}
