//! Release archive assembly.
//!
//! A release archive is a zip container with this layout:
//!
//! ```text
//! <id>.nuspec            package manifest
//! lib/app/...            application files
//! <metadata files>       splash image, icon, ...
//! [Content_Types].xml    extension → content type declarations
//! _rels/.rels            root → manifest relationship
//! ```

pub mod descriptors;
pub mod manifest;
pub mod naming;
pub mod release_notes;
pub mod template;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

pub use descriptors::write_descriptors;
pub use manifest::{PackageManifest, VERSION_MARKER_FILE};
pub use naming::{
    PackageFileInfo, delta_package_name, full_package_name, is_round_trip_package_id,
    parse_package_file_name, parse_package_file_path,
};
pub use release_notes::{markdown_to_html, render_release_notes};

use crate::bundler::{
    builder::Progress,
    error::Result,
    platform::Archiver,
    utils::fs,
};

/// Directory inside the archive holding the application files.
pub const APP_CONTENT_DIR: &str = "lib/app";

/// Assembles a release archive from a staged application directory.
///
/// # Process
///
/// 1. Recreates `staging_dir` empty
/// 2. Writes the manifest to `<staging>/<id>.nuspec`
/// 3. Copies `package_dir` into `<staging>/lib/app` (0-30% of progress)
/// 4. Copies each metadata file into the staging root
/// 5. Renders the release notes into the manifest
/// 6. Writes the content type and relationship descriptors
/// 7. Archives the staging directory to `output` (30-100% of progress)
///
/// # Arguments
///
/// * `archiver` - Produces the compressed artifact
/// * `package_dir` - Staged (preprocessed, possibly signed) application
/// * `manifest` - Package manifest
/// * `metadata_files` - Archive name → source path, copied verbatim
/// * `staging_dir` - Scratch directory owned by this call
/// * `output` - Archive path
/// * `progress` - Stage progress
pub async fn assemble_release_archive(
    archiver: &dyn Archiver,
    package_dir: &Path,
    manifest: &PackageManifest,
    metadata_files: &BTreeMap<String, PathBuf>,
    staging_dir: &Path,
    output: &Path,
    progress: Progress,
) -> Result<()> {
    fs::create_dir_all(staging_dir, true).await?;

    let manifest_path = staging_dir.join(manifest.file_name());
    manifest.write_to(&manifest_path).await?;

    let app_dir = staging_dir.join(APP_CONTENT_DIR);
    let stats = fs::copy_files(package_dir, &app_dir, progress.scoped(0, 30), true).await?;
    log::debug!(
        "Staged {} of {} files ({} excluded)",
        stats.copied,
        stats.total,
        stats.excluded
    );

    for (name, source) in metadata_files {
        fs::copy_file(source, &staging_dir.join(name)).await?;
    }

    render_release_notes(&manifest_path).await?;
    write_descriptors(staging_dir, &manifest.file_name()).await?;

    archiver
        .create_archive_from_directory(output, staging_dir, progress.scoped(30, 100))
        .await?;
    progress.report(100);

    log::info!("✓ Assembled release archive: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::platform::ZipArchiver;
    use semver::Version;
    use std::io::Read;
    use tempfile::TempDir;

    fn manifest() -> PackageManifest {
        PackageManifest {
            id: "MyApp".into(),
            title: "MyApp".into(),
            description: "MyApp".into(),
            authors: "MyApp".into(),
            version: Version::new(1, 0, 0),
            channel: "linux".into(),
            main_exe: "MyApp".into(),
            os: "linux".into(),
            os_min_version: None,
            machine_architecture: Some("x64".into()),
            rid: "linux-x64".into(),
            release_notes: Some("* first release".into()),
            release_notes_html: None,
        }
    }

    #[tokio::test]
    async fn produces_container_layout() {
        let dir = TempDir::new().unwrap();
        let app = dir.path().join("app");
        std::fs::create_dir_all(app.join("res")).unwrap();
        std::fs::write(app.join("MyApp"), b"#!/bin/sh").unwrap();
        std::fs::write(app.join("res/data.json"), b"{}").unwrap();
        std::fs::write(app.join("MyApp.pdb"), b"symbols").unwrap();
        let icon = dir.path().join("icon.png");
        std::fs::write(&icon, b"png").unwrap();

        let metadata = BTreeMap::from([("icon.png".to_string(), icon)]);
        let output = dir.path().join("MyApp-1.0.0-linux-full.nupkg");
        assemble_release_archive(
            &ZipArchiver,
            &app,
            &manifest(),
            &metadata,
            &dir.path().join("staging"),
            &output,
            Progress::none(),
        )
        .await
        .unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&output).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            [
                "MyApp.nuspec",
                "[Content_Types].xml",
                "_rels/.rels",
                "icon.png",
                "lib/app/MyApp",
                "lib/app/res/data.json",
            ]
        );

        let mut nuspec = String::new();
        archive
            .by_name("MyApp.nuspec")
            .unwrap()
            .read_to_string(&mut nuspec)
            .unwrap();
        let parsed = PackageManifest::from_xml(&nuspec).unwrap();
        assert!(parsed.release_notes_html.unwrap().contains("<li>first release</li>"));
    }
}
