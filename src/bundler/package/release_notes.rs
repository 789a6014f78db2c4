//! Release notes rendering.
//!
//! Release notes are written in Markdown. Before archiving, the manifest is
//! parsed, the notes are rendered to HTML and stored as `releaseNotesHtml`
//! alongside the raw text, and the manifest is rewritten.

use std::path::Path;

use pulldown_cmark::{Options, Parser, html};

use super::manifest::PackageManifest;
use crate::bundler::Result;

/// Renders Markdown to HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

impl PackageManifest {
    /// Returns the manifest with its release notes rendered to HTML.
    ///
    /// Blank or missing notes leave the manifest unchanged. Existing HTML is
    /// replaced, so applying this twice yields the same manifest.
    pub fn with_rendered_notes(self) -> Self {
        let html = match self.release_notes.as_deref() {
            Some(notes) if !notes.trim().is_empty() => markdown_to_html(notes),
            _ => return self,
        };
        Self {
            release_notes_html: Some(html),
            ..self
        }
    }
}

/// Renders the release notes of the manifest at `manifest_path` in place.
///
/// # Returns
///
/// `true` if the manifest was rewritten, `false` if it has no release notes.
pub async fn render_release_notes(manifest_path: &Path) -> Result<bool> {
    let manifest = PackageManifest::read_from(manifest_path).await?;
    if manifest.release_notes.is_none() {
        log::debug!("No release notes to render in {}", manifest_path.display());
        return Ok(false);
    }

    manifest
        .with_rendered_notes()
        .write_to(manifest_path)
        .await?;
    log::debug!("Rendered release notes into {}", manifest_path.display());
    Ok(true)
}
