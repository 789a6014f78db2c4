//! Script-based setup builder.
//!
//! Produces a gzip-compressed tarball holding the full release and an
//! `install.sh` that unpacks it into the user's application directory.

use std::{fs::File, path::Path};

use async_trait::async_trait;
use flate2::{Compression, write::GzEncoder};
use handlebars::Handlebars;

use super::SetupBuilder;
use crate::bundler::{
    Error, Result,
    builder::Progress,
    error::ErrorExt,
    package::{PackageManifest, template::INSTALL_SCRIPT_TEMPLATE},
    utils::fs,
};

/// Installer script name inside the setup archive.
pub const INSTALL_SCRIPT_FILE: &str = "install.sh";

/// Setup builder writing `install.sh` plus the full release into a tar.gz.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptSetupBuilder;

impl ScriptSetupBuilder {
    fn render_script(manifest: &PackageManifest, package_file: &str) -> Result<String> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string("install", INSTALL_SCRIPT_TEMPLATE)
            .map_err(|e| {
                Error::GenericError(format!("Failed to register install script template: {e}"))
            })?;

        let data = serde_json::json!({
            "id": shell_quote(&manifest.id),
            "title": shell_quote(&manifest.title),
            "version": shell_quote(&manifest.version.to_string()),
            "channel": shell_quote(&manifest.channel),
            "main_exe": shell_quote(&manifest.main_exe),
            "package_file": shell_quote(package_file),
        });

        handlebars
            .render("install", &data)
            .map_err(|e| Error::GenericError(format!("Failed to render install script: {e}")))
    }
}

#[async_trait]
impl SetupBuilder for ScriptSetupBuilder {
    async fn build_setup(
        &self,
        manifest: &PackageManifest,
        full_release: &Path,
        scratch_dir: &Path,
        output: &Path,
        progress: Progress,
    ) -> Result<()> {
        let package_file = full_release
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::GenericError(format!(
                    "invalid full release path: {}",
                    full_release.display()
                ))
            })?
            .to_string();

        fs::create_dir_all(scratch_dir, true).await?;
        let script_path = scratch_dir.join(INSTALL_SCRIPT_FILE);
        let script = Self::render_script(manifest, &package_file)?;
        tokio::fs::write(&script_path, script)
            .await
            .fs_context("writing install script", &script_path)?;
        progress.report(10);

        let output = output.to_path_buf();
        let full_release = full_release.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let result = write_setup_archive(&output, &script_path, &full_release, &package_file);
            if result.is_err() {
                let _ = std::fs::remove_file(&output);
            }
            result
        })
        .await
        .map_err(|e| Error::GenericError(format!("Setup archive task panicked: {}", e)))??;

        progress.report(100);
        log::info!("✓ Created setup package for {} {}", manifest.id, manifest.version);
        Ok(())
    }
}

/// Quotes `value` as one POSIX shell word.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn write_setup_archive(
    output: &Path,
    script_path: &Path,
    full_release: &Path,
    package_file: &str,
) -> Result<()> {
    let file = File::create(output).fs_context("creating setup archive", output)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);

    let script = std::fs::read(script_path).fs_context("reading install script", script_path)?;
    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    archive
        .append_data(&mut header, INSTALL_SCRIPT_FILE, script.as_slice())
        .fs_context("adding install script", output)?;

    archive
        .append_path_with_name(full_release, package_file)
        .fs_context("adding full release", full_release)?;

    let encoder = archive.into_inner().fs_context("finishing setup archive", output)?;
    encoder.finish().fs_context("writing setup archive", output)?;
    Ok(())
}
