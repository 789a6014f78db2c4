//! Zip archiver.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use super::Archiver;
use crate::bundler::{
    Error, Result,
    builder::Progress,
    error::ErrorExt,
};

/// Default deflate level for release archives.
const DEFAULT_LEVEL: i64 = 6;

/// Archiver writing deflate-compressed zip files.
///
/// Entries are added in file name order so identical inputs produce
/// identical entry lists.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipArchiver;

#[async_trait]
impl Archiver for ZipArchiver {
    async fn create_archive_from_directory(
        &self,
        output: &Path,
        source_dir: &Path,
        progress: Progress,
    ) -> Result<()> {
        let output = output.to_path_buf();
        let source_dir = source_dir.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let result = zip_directory(&output, &source_dir, Some(DEFAULT_LEVEL), &progress);
            if result.is_err() {
                let _ = std::fs::remove_file(&output);
            }
            result
        })
        .await
        .map_err(|e| Error::GenericError(format!("Archive task panicked: {}", e)))?
    }
}

/// Zips every file under `source_dir` into `output`, reporting per file.
pub(super) fn zip_directory(
    output: &Path,
    source_dir: &Path,
    level: Option<i64>,
    progress: &Progress,
) -> Result<()> {
    let files: Vec<PathBuf> = walkdir::WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
            Ok(_) => None,
            Err(e) => Some(Err(Error::from(e))),
        })
        .collect::<Result<_>>()?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).fs_context("creating directory", parent)?;
    }
    let file = File::create(output).fs_context("creating archive", output)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));

    for (index, path) in files.iter().enumerate() {
        let name = archive_name(path.strip_prefix(source_dir)?);
        writer.start_file(name, entry_options(path, level))?;
        let mut source = File::open(path).fs_context("opening file", path)?;
        io::copy(&mut source, &mut writer).fs_context("archiving file", path)?;
        progress.report_fraction(index + 1, files.len());
    }

    let mut inner = writer.finish()?;
    inner.flush().fs_context("writing archive", output)?;
    Ok(())
}

/// Zip entry name for a relative path, always using `/`.
pub(super) fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Entry options with deflate at `level`, keeping unix permission bits.
pub(super) fn entry_options(path: &Path, level: Option<i64>) -> SimpleFileOptions {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(level);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            return options.unix_permissions(metadata.permissions().mode() & 0o777);
        }
    }
    #[cfg(not(unix))]
    let _ = path;

    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::Read,
        sync::{Arc, Mutex},
    };
    use tempfile::TempDir;

    #[tokio::test]
    async fn archives_files_in_name_order() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("b")).unwrap();
        std::fs::write(src.join("c.txt"), b"c").unwrap();
        std::fs::write(src.join("a.txt"), b"a").unwrap();
        std::fs::write(src.join("b/inner.txt"), b"inner").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let output = dir.path().join("out.zip");
        ZipArchiver
            .create_archive_from_directory(
                &output,
                &src,
                Progress::new(move |p| sink.lock().unwrap().push(p)),
            )
            .await
            .unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let names: Vec<_> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names, ["a.txt", "b/inner.txt", "c.txt"]);

        let mut inner = String::new();
        archive
            .by_name("b/inner.txt")
            .unwrap()
            .read_to_string(&mut inner)
            .unwrap();
        assert_eq!(inner, "inner");
        assert_eq!(seen.lock().unwrap().last(), Some(&100));
    }

    #[tokio::test]
    async fn missing_source_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.zip");
        let result = ZipArchiver
            .create_archive_from_directory(&output, &dir.path().join("missing"), Progress::none())
            .await;
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
