//! File system utilities for packaging.
//!
//! Provides the recursive file copier used by preprocessing and archive
//! assembly, along with idempotent directory and file helpers.

use std::{
    io,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use glob::{MatchOptions, Pattern};
use tokio::fs;

use crate::bundler::{
    builder::Progress,
    error::{Error, ErrorExt, Result},
};

/// Files never shipped in a release: crash dumps, host shims, nested
/// packages and debug symbols.
static ANNOYANCES: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    ["*.dmp", "*.vshost.*", "*.nupkg", "*.pdb"]
        .iter()
        .map(|p| Pattern::new(p).expect("exclusion pattern is valid"))
        .collect()
});

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Returns true if `path`'s file name matches an exclusion pattern.
pub fn is_annoyance(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    ANNOYANCES
        .iter()
        .any(|pattern| pattern.matches_with(name, MATCH_OPTIONS))
}

/// Outcome of [`copy_files`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CopyStats {
    /// Files found under the source directory
    pub total: usize,
    /// Files written to the target directory
    pub copied: usize,
    /// Files skipped by the exclusion patterns
    pub excluded: usize,
}

/// Recursively copies every file under `source` into `target`.
///
/// # Process
///
/// 1. Counts all files under `source` once, up front
/// 2. Walks the tree, recreating its directory structure under `target`
/// 3. Copies each file, overwriting existing files, unless
///    `exclude_annoyances` is set and the file matches [`is_annoyance`]
/// 4. Reports `processed / total` after every file, excluded ones included
///
/// # Returns
///
/// File counts for the copy.
pub async fn copy_files(
    source: &Path,
    target: &Path,
    progress: Progress,
    exclude_annoyances: bool,
) -> Result<CopyStats> {
    if !source.is_dir() {
        return Err(Error::GenericError(format!(
            "{} is not a directory",
            source.display()
        )));
    }

    let source = source.to_path_buf();
    let target = target.to_path_buf();

    tokio::task::spawn_blocking(move || {
        copy_files_blocking(&source, &target, &progress, exclude_annoyances)
    })
    .await
    .map_err(|e| Error::GenericError(format!("File copy task panicked: {}", e)))?
}

fn copy_files_blocking(
    source: &Path,
    target: &Path,
    progress: &Progress,
    exclude_annoyances: bool,
) -> Result<CopyStats> {
    let files: Vec<PathBuf> = walkdir::WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
            Ok(_) => None,
            Err(e) => Some(Err(Error::from(e))),
        })
        .collect::<Result<_>>()?;

    std::fs::create_dir_all(target).fs_context("creating directory", target)?;

    let mut stats = CopyStats {
        total: files.len(),
        ..Default::default()
    };

    for (index, file) in files.iter().enumerate() {
        let relative = file.strip_prefix(source)?;
        if exclude_annoyances && is_annoyance(file) {
            log::debug!("Excluding {}", relative.display());
            stats.excluded += 1;
        } else {
            let dest = target.join(relative);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).fs_context("creating directory", parent)?;
            }
            std::fs::copy(file, &dest).fs_context("copying file", file)?;
            stats.copied += 1;
        }
        progress.report_fraction(index + 1, stats.total);
    }

    Ok(stats)
}

/// Creates all of the directories of the specified path, erasing it first if specified.
pub async fn create_dir_all(path: &Path, erase: bool) -> Result<()> {
    if erase {
        remove_dir_all(path).await?;
    }
    fs::create_dir_all(path)
        .await
        .fs_context("creating directory", path)
}

/// Removes the directory and its contents if it exists.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Fs {
            context: "removing directory",
            path: path.to_path_buf(),
            error: e,
        }),
    }
}

/// Removes the file if it exists.
pub async fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Fs {
            context: "removing file",
            path: path.to_path_buf(),
            error: e,
        }),
    }
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.is_file() {
        return Err(Error::GenericError(format!(
            "{} does not exist or is not a file",
            from.display()
        )));
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file", from)?;
    Ok(())
}
