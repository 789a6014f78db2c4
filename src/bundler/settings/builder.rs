//! Builder for constructing [`PackOptions`].

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use semver::Version;

use super::{DeltaMode, PackOptions, RuntimeInfo, TargetOs};
use crate::bundler::{
    error::{Error, Result},
    package::is_round_trip_package_id,
};

static PACKAGE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("package id pattern is valid"));

/// Names that would collide with the release archive layout.
const RESERVED_METADATA_NAMES: &[&str] = &["[content_types].xml", "lib", "_rels", "package"];

/// Builder for constructing [`PackOptions`].
///
/// Provides a fluent API with validation in [`build`](Self::build).
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_pack::bundler::PackOptionsBuilder;
///
/// # fn example() -> kodegen_bundler_pack::bundler::Result<()> {
/// let options = PackOptionsBuilder::new()
///     .package_id("MyApp")
///     .version("1.0.0")
///     .package_dir("target/release/app")
///     .release_dir("Releases")
///     .runtime("linux-x64")
///     .channel("stable")
///     .build()?;
/// assert_eq!(options.title(), "MyApp");
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct PackOptionsBuilder {
    runtime: Option<String>,
    release_dir: Option<PathBuf>,
    channel: Option<String>,
    delta_mode: DeltaMode,
    package_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    authors: Option<String>,
    version: Option<String>,
    package_dir: Option<PathBuf>,
    main_exe: Option<String>,
    release_notes: Option<PathBuf>,
    metadata_files: BTreeMap<String, PathBuf>,
}

impl PackOptionsBuilder {
    /// Creates a new options builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the target runtime identifier.
    ///
    /// Default: runtime of the running process
    pub fn runtime(mut self, rid: impl Into<String>) -> Self {
        self.runtime = Some(rid.into());
        self
    }

    /// Sets the release output directory.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn release_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.release_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the release channel.
    ///
    /// Default: the OS short name (`win`, `osx`, `linux`)
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Sets the delta strategy.
    ///
    /// Default: [`DeltaMode::BestSpeed`]
    pub fn delta_mode(mut self, mode: DeltaMode) -> Self {
        self.delta_mode = mode;
        self
    }

    /// Sets the package identifier.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn package_id(mut self, id: impl Into<String>) -> Self {
        self.package_id = Some(id.into());
        self
    }

    /// Sets the display title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the authors.
    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = Some(authors.into());
        self
    }

    /// Sets the package version (semver).
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the directory holding the built application.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn package_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.package_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the main executable, relative to the package directory.
    pub fn main_exe(mut self, exe: impl Into<String>) -> Self {
        self.main_exe = Some(exe.into());
        self
    }

    /// Sets the release notes file.
    pub fn release_notes<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.release_notes = Some(path.as_ref().to_path_buf());
        self
    }

    /// Adds the installer splash image, stored as `splashimage.<ext>`.
    pub fn splash_image<P: AsRef<Path>>(self, path: P) -> Self {
        let name = with_source_extension("splashimage", path.as_ref());
        self.metadata_file(name, path)
    }

    /// Adds the application icon, stored as `icon.<ext>`.
    pub fn icon<P: AsRef<Path>>(self, path: P) -> Self {
        let name = with_source_extension("icon", path.as_ref());
        self.metadata_file(name, path)
    }

    /// Adds a file copied verbatim into the release archive root.
    pub fn metadata_file<P: AsRef<Path>>(mut self, name: impl Into<String>, path: P) -> Self {
        self.metadata_files
            .insert(name.into(), path.as_ref().to_path_buf());
        self
    }

    /// Builds the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptions`] if a required field is missing or
    /// malformed, and [`Error::InvalidRuntime`] for unknown runtime identifiers.
    pub fn build(self) -> Result<PackOptions> {
        let package_id = self
            .package_id
            .ok_or_else(|| Error::InvalidOptions("package id is required".into()))?;
        if !PACKAGE_ID.is_match(&package_id) {
            return Err(Error::InvalidOptions(format!(
                "package id `{package_id}` may only contain letters, digits, '.', '_' and '-'"
            )));
        }
        if !is_round_trip_package_id(&package_id) {
            return Err(Error::InvalidOptions(format!(
                "package id `{package_id}` must not contain a version-like segment such as `-1.2`"
            )));
        }

        let version = self
            .version
            .ok_or_else(|| Error::InvalidOptions("version is required".into()))?;
        let version = Version::parse(version.trim()).map_err(|e| {
            Error::InvalidOptions(format!("version `{version}` is not valid semver: {e}"))
        })?;

        let package_dir = self
            .package_dir
            .ok_or_else(|| Error::InvalidOptions("package directory is required".into()))?;
        let release_dir = self
            .release_dir
            .ok_or_else(|| Error::InvalidOptions("release directory is required".into()))?;

        let runtime = match self.runtime {
            Some(rid) => rid.parse::<RuntimeInfo>()?,
            None => RuntimeInfo::current(),
        };

        for name in self.metadata_files.keys() {
            validate_metadata_name(name, &package_id)?;
        }

        let main_exe = self.main_exe.unwrap_or_else(|| match runtime.os {
            TargetOs::Windows => format!("{package_id}.exe"),
            _ => package_id.clone(),
        });

        Ok(PackOptions {
            runtime,
            release_dir,
            channel: self.channel.filter(|c| !c.trim().is_empty()),
            delta_mode: self.delta_mode,
            package_id,
            title: self.title.filter(|s| !s.trim().is_empty()),
            description: self.description.filter(|s| !s.trim().is_empty()),
            authors: self.authors.filter(|s| !s.trim().is_empty()),
            version,
            package_dir,
            main_exe,
            release_notes: self.release_notes,
            metadata_files: self.metadata_files,
        })
    }
}

fn with_source_extension(stem: &str, path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!("{stem}.{}", ext.to_string_lossy().to_ascii_lowercase()),
        None => stem.to_string(),
    }
}

fn validate_metadata_name(name: &str, package_id: &str) -> Result<()> {
    let is_plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\']);
    if !is_plain {
        return Err(Error::InvalidOptions(format!(
            "metadata file name `{name}` must be a plain file name"
        )));
    }

    let lower = name.to_ascii_lowercase();
    let manifest = format!("{}.nuspec", package_id.to_ascii_lowercase());
    if lower == manifest || RESERVED_METADATA_NAMES.contains(&lower.as_str()) {
        return Err(Error::InvalidOptions(format!(
            "metadata file name `{name}` is reserved by the release archive layout"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PackOptionsBuilder {
        PackOptionsBuilder::new()
            .package_id("MyApp")
            .version("1.0.0")
            .package_dir("/tmp/app")
            .release_dir("/tmp/releases")
            .runtime("linux-x64")
    }

    #[test]
    fn defaults_follow_package_id() {
        let options = base().build().unwrap();
        assert_eq!(options.title(), "MyApp");
        assert_eq!(options.description(), "MyApp");
        assert_eq!(options.authors(), "MyApp");
        assert_eq!(options.main_exe(), "MyApp");
        assert_eq!(options.delta_mode(), DeltaMode::BestSpeed);
        assert_eq!(options.channel(), None);
    }

    #[test]
    fn description_defaults_to_title() {
        let options = base().title("My Application").build().unwrap();
        assert_eq!(options.description(), "My Application");
        assert_eq!(options.authors(), "MyApp");
    }

    #[test]
    fn windows_main_exe_gets_extension() {
        let options = base().runtime("win-x64").build().unwrap();
        assert_eq!(options.main_exe(), "MyApp.exe");
    }

    #[test]
    fn rejects_invalid_fields() {
        assert!(matches!(
            base().package_id("My App").build(),
            Err(Error::InvalidOptions(_))
        ));
        assert!(matches!(
            base().version("1.0").build(),
            Err(Error::InvalidOptions(_))
        ));
        assert!(matches!(
            PackOptionsBuilder::new().version("1.0.0").build(),
            Err(Error::InvalidOptions(_))
        ));
        assert!(matches!(
            base().runtime("amiga").build(),
            Err(Error::InvalidRuntime(_))
        ));
    }

    #[test]
    fn rejects_ids_that_look_versioned() {
        for id in ["Tool-2.0", "App.1.0"] {
            let err = base().package_id(id).build().unwrap_err();
            assert!(matches!(err, Error::InvalidOptions(_)), "{id}");
            assert!(err.is_configuration());
        }
        assert_eq!(base().package_id("Tool-2").build().unwrap().package_id(), "Tool-2");
    }

    #[test]
    fn metadata_names_are_checked() {
        let options = base()
            .splash_image("/art/Splash.GIF")
            .icon("/art/app.ico")
            .build()
            .unwrap();
        let names: Vec<_> = options.metadata_files().keys().cloned().collect();
        assert_eq!(names, ["icon.ico", "splashimage.gif"]);

        assert!(base().metadata_file("lib", "/x").build().is_err());
        assert!(base().metadata_file("MyApp.nuspec", "/x").build().is_err());
        assert!(base().metadata_file("a/b.txt", "/x").build().is_err());
    }
}
