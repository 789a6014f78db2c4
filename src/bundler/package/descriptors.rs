//! Container descriptors: `[Content_Types].xml` and `_rels/.rels`.
//!
//! Both are generated after every other file has been staged, since the
//! content types must list each extension present in the final file set.

use std::{collections::BTreeSet, path::Path};

use handlebars::Handlebars;
use uuid::Uuid;

use super::template::{CONTENT_TYPES_TEMPLATE, RELS_TEMPLATE};
use crate::bundler::error::{Error, ErrorExt, Result};

/// Content type descriptor file name.
pub const CONTENT_TYPES_FILE: &str = "[Content_Types].xml";
/// Relationships directory name.
pub const RELS_DIR: &str = "_rels";
/// Relationships file name.
pub const RELS_FILE: &str = ".rels";

/// Writes the relationship and content type descriptors into `staging_dir`.
///
/// # Process
///
/// 1. Writes `_rels/.rels` pointing at `/<manifest_name>`
/// 2. Collects the lowercase extension of every staged file
/// 3. Writes `[Content_Types].xml` declaring each extension
pub async fn write_descriptors(staging_dir: &Path, manifest_name: &str) -> Result<()> {
    let mut handlebars = Handlebars::new();
    handlebars
        .register_template_string("rels", RELS_TEMPLATE)
        .map_err(|e| Error::GenericError(format!("Failed to register rels template: {e}")))?;
    handlebars
        .register_template_string("content_types", CONTENT_TYPES_TEMPLATE)
        .map_err(|e| {
            Error::GenericError(format!("Failed to register content types template: {e}"))
        })?;

    let rels_dir = staging_dir.join(RELS_DIR);
    tokio::fs::create_dir_all(&rels_dir)
        .await
        .fs_context("creating directory", &rels_dir)?;
    let rels = handlebars
        .render(
            "rels",
            &serde_json::json!({
                "manifest": manifest_name,
                "id": relationship_id(manifest_name),
            }),
        )
        .map_err(|e| Error::GenericError(format!("Failed to render rels: {e}")))?;
    let rels_path = rels_dir.join(RELS_FILE);
    tokio::fs::write(&rels_path, rels)
        .await
        .fs_context("writing relationships", &rels_path)?;

    let extensions = collect_extensions(staging_dir).await?;
    let content_types = handlebars
        .render(
            "content_types",
            &serde_json::json!({ "extensions": extensions }),
        )
        .map_err(|e| Error::GenericError(format!("Failed to render content types: {e}")))?;
    let content_types_path = staging_dir.join(CONTENT_TYPES_FILE);
    tokio::fs::write(&content_types_path, content_types)
        .await
        .fs_context("writing content types", &content_types_path)?;

    Ok(())
}

/// Stable relationship id derived from the manifest name.
pub fn relationship_id(manifest_name: &str) -> String {
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_URL, manifest_name.as_bytes());
    let hex = uuid.simple().to_string().to_ascii_uppercase();
    format!("R{}", &hex[..16])
}

/// Distinct lowercase file extensions under `dir`, sorted.
pub async fn collect_extensions(dir: &Path) -> Result<BTreeSet<String>> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut extensions = BTreeSet::new();
        for entry in walkdir::WalkDir::new(&dir) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(ext) = file_extension(entry.path()) {
                extensions.insert(ext.to_ascii_lowercase());
            }
        }
        Ok(extensions)
    })
    .await
    .map_err(|e| Error::GenericError(format!("Extension scan task panicked: {}", e)))?
}

/// Extension of `path`; dot files such as `.rels` use the name after the dot.
fn file_extension(path: &Path) -> Option<String> {
    if let Some(ext) = path.extension() {
        return Some(ext.to_string_lossy().into_owned()).filter(|e| !e.is_empty());
    }
    let name = path.file_name()?.to_string_lossy();
    name.strip_prefix('.')
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn declares_every_extension() {
        let dir = TempDir::new().unwrap();
        let app = dir.path().join("lib/app");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("MyApp"), b"bin").unwrap();
        std::fs::write(app.join("core.SO"), b"so").unwrap();
        std::fs::write(app.join("data.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("MyApp.nuspec"), b"<package/>").unwrap();

        write_descriptors(dir.path(), "MyApp.nuspec").await.unwrap();

        let types = std::fs::read_to_string(dir.path().join(CONTENT_TYPES_FILE)).unwrap();
        for ext in ["json", "nuspec", "rels", "so"] {
            assert!(
                types.contains(&format!(
                    r#"<Default Extension="{ext}" ContentType="application/octet" />"#
                )),
                "missing {ext} in {types}"
            );
        }
        assert!(!types.contains("Extension=\"xml\""));

        let rels = std::fs::read_to_string(dir.path().join("_rels/.rels")).unwrap();
        assert!(rels.contains(r#"Target="/MyApp.nuspec""#));
        assert!(rels.contains(&format!(r#"Id="{}""#, relationship_id("MyApp.nuspec"))));
    }

    #[test]
    fn relationship_ids_are_stable() {
        let id = relationship_id("MyApp.nuspec");
        assert_eq!(id, relationship_id("MyApp.nuspec"));
        assert_ne!(id, relationship_id("Other.nuspec"));
        assert_eq!(id.len(), 17);
        assert!(id.starts_with('R'));
    }
}
