//! Portable package builder.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;

use super::{Archiver, PortableBuilder, ZipArchiver};
use crate::bundler::{
    Result,
    builder::Progress,
    error::ErrorExt,
    package::PackageManifest,
    utils::fs,
};

/// Marker file telling the updater it runs from a portable install.
pub const PORTABLE_MARKER_FILE: &str = ".portable";

/// Builds a portable archive: the application under `current/` next to a
/// `.portable` marker.
#[derive(Clone)]
pub struct ArchivePortableBuilder {
    archiver: Arc<dyn Archiver>,
}

impl ArchivePortableBuilder {
    /// Creates a builder producing archives with `archiver`.
    pub fn new(archiver: Arc<dyn Archiver>) -> Self {
        Self { archiver }
    }
}

impl Default for ArchivePortableBuilder {
    fn default() -> Self {
        Self::new(Arc::new(ZipArchiver))
    }
}

#[async_trait]
impl PortableBuilder for ArchivePortableBuilder {
    async fn build_portable(
        &self,
        manifest: &PackageManifest,
        package_dir: &Path,
        scratch_dir: &Path,
        output: &Path,
        progress: Progress,
    ) -> Result<()> {
        fs::create_dir_all(scratch_dir, true).await?;

        let current = scratch_dir.join("current");
        fs::copy_files(package_dir, &current, progress.scoped(0, 40), true).await?;

        let marker = scratch_dir.join(PORTABLE_MARKER_FILE);
        tokio::fs::write(&marker, format!("{} {}\n", manifest.id, manifest.version))
            .await
            .fs_context("writing portable marker", &marker)?;

        self.archiver
            .create_archive_from_directory(output, scratch_dir, progress.scoped(40, 100))
            .await?;

        log::info!("✓ Created portable package: {}", output.display());
        Ok(())
    }
}
