//! Command line argument parsing and validation.

use clap::Parser;
use std::path::PathBuf;

use crate::bundler::DeltaMode;
use crate::metadata::PackConfig;

/// Release packager for self-updating applications
#[derive(Parser, Debug, Default)]
#[command(
    name = "kodegen_bundler_pack",
    version,
    about = "Release packager for self-updating applications",
    long_about = "Packages a built application directory into a full release, a delta against the
previous release of the channel, a portable archive and a setup package, and
records the releases in the channel feed of the output directory.

Usage:
  kodegen_bundler_pack -u MyApp -v 1.2.0 -p target/release/app -o Releases
  kodegen_bundler_pack -u MyApp -v 1.3.0-rc.1 -p build -c beta --delta best-size

Options may also be given in kodegen-pack.toml; command line flags take precedence.

Exit code 0 = every artifact and the release feed were written.
Exit code 2 = invalid arguments or configuration, nothing was written."
)]
pub struct Args {
    /// Package id
    #[arg(short = 'u', long, value_name = "ID", env = "KODEGEN_PACK_ID")]
    pub pack_id: Option<String>,

    /// Base semantic version of the release
    #[arg(short = 'v', long, value_name = "VERSION", env = "KODEGEN_PACK_VERSION")]
    pub pack_version: Option<String>,

    /// Directory holding the built application
    #[arg(short = 'p', long, value_name = "DIR", env = "KODEGEN_PACK_DIR")]
    pub pack_dir: Option<PathBuf>,

    /// Release directory receiving the artifacts and feeds
    #[arg(short = 'o', long, value_name = "DIR", env = "KODEGEN_PACK_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Release channel (default: the target OS short name)
    #[arg(short = 'c', long, value_name = "CHANNEL", env = "KODEGEN_PACK_CHANNEL")]
    pub channel: Option<String>,

    /// Target runtime identifier, e.g. win-x64, osx-arm64, linux-x64
    #[arg(short = 'r', long, value_name = "RID", env = "KODEGEN_PACK_RUNTIME")]
    pub runtime: Option<String>,

    /// Delta mode: none, best-speed, best-size
    #[arg(long, value_name = "MODE", env = "KODEGEN_PACK_DELTA")]
    pub delta: Option<String>,

    /// Display title (default: package id)
    #[arg(long, value_name = "TITLE")]
    pub pack_title: Option<String>,

    /// Authors (default: package id)
    #[arg(long, value_name = "AUTHORS")]
    pub pack_authors: Option<String>,

    /// Description (default: title)
    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    /// Main executable, relative to the package directory (default: package id)
    #[arg(long, value_name = "NAME")]
    pub main_exe: Option<String>,

    /// Markdown release notes
    #[arg(long, value_name = "FILE")]
    pub release_notes: Option<PathBuf>,

    /// Splash image shown by the installer
    #[arg(long, value_name = "FILE")]
    pub splash_image: Option<PathBuf>,

    /// Application icon
    #[arg(long, value_name = "FILE")]
    pub icon: Option<PathBuf>,

    /// Command run for each signable file; `{{file}}` is replaced by its path
    #[arg(long, value_name = "TEMPLATE", env = "KODEGEN_PACK_SIGN_TEMPLATE")]
    pub sign_template: Option<String>,

    /// Configuration file (default: ./kodegen-pack.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Fills every option not given on the command line from `config`.
    pub fn merge(mut self, config: PackConfig) -> Self {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }

        fill(&mut self.pack_id, config.pack_id);
        fill(&mut self.pack_version, config.pack_version);
        fill(&mut self.pack_dir, config.pack_dir);
        fill(&mut self.output, config.output);
        fill(&mut self.channel, config.channel);
        fill(&mut self.runtime, config.runtime);
        fill(&mut self.delta, config.delta);
        fill(&mut self.pack_title, config.pack_title);
        fill(&mut self.pack_authors, config.pack_authors);
        fill(&mut self.description, config.description);
        fill(&mut self.main_exe, config.main_exe);
        fill(&mut self.release_notes, config.release_notes);
        fill(&mut self.splash_image, config.splash_image);
        fill(&mut self.icon, config.icon);
        fill(&mut self.sign_template, config.sign_template);
        self
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        for (value, flag) in [
            (self.pack_id.is_some(), "--pack-id"),
            (self.pack_version.is_some(), "--pack-version"),
            (self.pack_dir.is_some(), "--pack-dir"),
        ] {
            if !value {
                return Err(format!("{flag} is required"));
            }
        }

        if let Some(delta) = &self.delta {
            delta.parse::<DeltaMode>().map_err(|e| e.to_string())?;
        }

        if self.sign_template.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err("--sign-template cannot be empty".to_string());
        }

        Ok(())
    }

    /// Release directory, defaulting to `Releases` in the working directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from("Releases"))
    }
}
