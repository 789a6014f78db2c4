//! File-level delta packages.
//!
//! A delta has the same layout as a full release. Application files that are
//! new or changed since the previous release are stored whole; unchanged
//! files are replaced by `<name>.shasum` holding `<sha256> <size>`, which the
//! updater resolves against the installed copy.

use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

use super::DeltaBuilder;
use crate::bundler::{
    Error, Result,
    builder::Progress,
    error::ErrorExt,
    package::APP_CONTENT_DIR,
    settings::DeltaMode,
};

/// Suffix of placeholder entries for unchanged files.
pub const SHASUM_SUFFIX: &str = ".shasum";

/// Counts of application files by outcome.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DeltaStats {
    /// Files absent from the previous release
    pub added: usize,
    /// Files whose content changed
    pub changed: usize,
    /// Files replaced by checksum placeholders
    pub unchanged: usize,
    /// Files present only in the previous release
    pub removed: usize,
}

/// Delta builder comparing application files by SHA-256.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileDeltaBuilder;

#[async_trait]
impl DeltaBuilder for FileDeltaBuilder {
    async fn create_delta_package(
        &self,
        previous: &Path,
        new: &Path,
        output: &Path,
        mode: DeltaMode,
        progress: Progress,
    ) -> Result<(PathBuf, DeltaStats)> {
        let level = mode.compression_level().ok_or_else(|| {
            Error::GenericError("delta packages are disabled for delta mode none".into())
        })?;

        let previous = previous.to_path_buf();
        let new = new.to_path_buf();
        let output = output.to_path_buf();

        let stats = tokio::task::spawn_blocking({
            let output = output.clone();
            move || {
                let result = write_delta(&previous, &new, &output, level, &progress);
                if result.is_err() {
                    let _ = std::fs::remove_file(&output);
                }
                result
            }
        })
        .await
        .map_err(|e| Error::GenericError(format!("Delta task panicked: {}", e)))??;

        log::info!(
            "✓ Created delta package: {} ({} added, {} changed, {} unchanged, {} removed)",
            output.display(),
            stats.added,
            stats.changed,
            stats.unchanged,
            stats.removed
        );
        Ok((output, stats))
    }
}

fn is_app_entry(name: &str) -> bool {
    name.strip_prefix(APP_CONTENT_DIR)
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
}

fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 and size of every application file in a release archive.
fn app_digests(path: &Path) -> Result<HashMap<String, (String, u64)>> {
    let file = File::open(path).fs_context("opening release", path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut digests = HashMap::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || !is_app_entry(entry.name()) {
            continue;
        }
        let name = entry.name().to_string();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .fs_context("reading release entry", path)?;
        digests.insert(name, (digest(&bytes), bytes.len() as u64));
    }
    Ok(digests)
}

fn write_delta(
    previous: &Path,
    new: &Path,
    output: &Path,
    level: i64,
    progress: &Progress,
) -> Result<DeltaStats> {
    let previous_digests = app_digests(previous)?;

    let file = File::open(new).fs_context("opening release", new)?;
    let mut archive = ZipArchive::new(file)?;

    let out = File::create(output).fs_context("creating delta", output)?;
    let mut writer = ZipWriter::new(BufWriter::new(out));
    let mut stats = DeltaStats::default();
    let mut seen = HashSet::new();
    let total = archive.len();

    for index in 0..total {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level));
        if let Some(mode) = entry.unix_mode() {
            options = options.unix_permissions(mode);
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .fs_context("reading release entry", new)?;
        drop(entry);

        if is_app_entry(&name) {
            seen.insert(name.clone());
            let sha = digest(&bytes);
            match previous_digests.get(&name) {
                Some((previous_sha, _)) if *previous_sha == sha => {
                    writer.start_file(format!("{name}{SHASUM_SUFFIX}"), options)?;
                    write!(writer, "{} {}", sha, bytes.len()).fs_context("writing delta", output)?;
                    stats.unchanged += 1;
                }
                Some(_) => {
                    writer.start_file(name, options)?;
                    writer.write_all(&bytes).fs_context("writing delta", output)?;
                    stats.changed += 1;
                }
                None => {
                    writer.start_file(name, options)?;
                    writer.write_all(&bytes).fs_context("writing delta", output)?;
                    stats.added += 1;
                }
            }
        } else {
            writer.start_file(name, options)?;
            writer.write_all(&bytes).fs_context("writing delta", output)?;
        }
        progress.report_fraction(index + 1, total);
    }

    stats.removed = previous_digests
        .keys()
        .filter(|name| !seen.contains(*name))
        .count();

    let mut inner = writer.finish()?;
    inner.flush().fs_context("writing delta", output)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn release(path: &Path, files: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in files {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn classifies_application_files() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("old.nupkg");
        let new = dir.path().join("new.nupkg");
        release(
            &old,
            &[
                ("MyApp.nuspec", "v1"),
                ("lib/app/MyApp", "binary v1"),
                ("lib/app/data.json", "{}"),
                ("lib/app/legacy.txt", "gone"),
            ],
        );
        release(
            &new,
            &[
                ("MyApp.nuspec", "v2"),
                ("lib/app/MyApp", "binary v2"),
                ("lib/app/data.json", "{}"),
                ("lib/app/plugin.so", "new"),
            ],
        );

        let output = dir.path().join("delta.nupkg");
        let (path, stats) = FileDeltaBuilder
            .create_delta_package(&old, &new, &output, DeltaMode::BestSize, Progress::none())
            .await
            .unwrap();

        assert_eq!(path, output);
        assert_eq!(
            stats,
            DeltaStats { added: 1, changed: 1, unchanged: 1, removed: 1 }
        );

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let mut shasum = String::new();
        archive
            .by_name("lib/app/data.json.shasum")
            .unwrap()
            .read_to_string(&mut shasum)
            .unwrap();
        assert_eq!(shasum, format!("{} 2", digest(b"{}")));
        assert!(archive.by_name("lib/app/data.json").is_err());
        assert!(archive.by_name("lib/app/MyApp").is_ok());
        assert!(archive.by_name("MyApp.nuspec").is_ok());
    }

    #[tokio::test]
    async fn disabled_mode_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = FileDeltaBuilder
            .create_delta_package(
                &dir.path().join("a"),
                &dir.path().join("b"),
                &dir.path().join("c"),
                DeltaMode::None,
                Progress::none(),
            )
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, Error::GenericError(_)));
        assert!(!err.is_configuration());
    }

    #[tokio::test]
    async fn failure_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let new = dir.path().join("new.nupkg");
        release(&new, &[("lib/app/MyApp", "bin")]);
        let output = dir.path().join("delta.nupkg");

        let result = FileDeltaBuilder
            .create_delta_package(
                &dir.path().join("missing.nupkg"),
                &new,
                &output,
                DeltaMode::BestSpeed,
                Progress::none(),
            )
            .await;
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
