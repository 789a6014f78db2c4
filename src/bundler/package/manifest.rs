//! Package manifest (`.nuspec`) model, serialization and parsing.

use std::{collections::HashMap, path::Path};

use handlebars::Handlebars;
use semver::Version;
use xml::reader::{EventReader, XmlEvent};

use super::template::NUSPEC_TEMPLATE;
use crate::bundler::{
    error::{Error, ErrorExt, Result},
    settings::PackOptions,
};

/// Name of the manifest copy embedded in the packaged application directory.
pub const VERSION_MARKER_FILE: &str = "sq.version";

/// Logical package descriptor written to the archive root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageManifest {
    /// Package id
    pub id: String,
    /// Display title
    pub title: String,
    /// Description
    pub description: String,
    /// Authors
    pub authors: String,
    /// Resolved (channel-suffixed) version
    pub version: Version,
    /// Release channel
    pub channel: String,
    /// Main executable relative to the application root
    pub main_exe: String,
    /// OS short name (`win`, `osx`, `linux`)
    pub os: String,
    /// Minimum OS version from the runtime identifier
    pub os_min_version: Option<String>,
    /// Architecture from the runtime identifier
    pub machine_architecture: Option<String>,
    /// Runtime identifier
    pub rid: String,
    /// Raw release notes
    pub release_notes: Option<String>,
    /// Release notes rendered to HTML
    pub release_notes_html: Option<String>,
}

impl PackageManifest {
    /// Builds the manifest for a run.
    pub fn from_options(
        options: &PackOptions,
        version: &Version,
        channel: &str,
        release_notes: Option<String>,
    ) -> Self {
        let runtime = options.runtime();
        Self {
            id: options.package_id().to_string(),
            title: options.title().to_string(),
            description: options.description().to_string(),
            authors: options.authors().to_string(),
            version: version.clone(),
            channel: channel.to_string(),
            main_exe: options.main_exe().to_string(),
            os: runtime.os.short_name().to_string(),
            os_min_version: runtime.os_min_version.clone(),
            machine_architecture: runtime.arch.map(|a| a.rid_name().to_string()),
            rid: runtime.identifier.clone(),
            release_notes: release_notes.filter(|n| !n.trim().is_empty()),
            release_notes_html: None,
        }
    }

    /// Manifest file name inside the archive.
    pub fn file_name(&self) -> String {
        format!("{}.nuspec", self.id)
    }

    /// Serializes the manifest to XML.
    pub fn to_xml(&self) -> Result<String> {
        let mut handlebars = Handlebars::new();
        handlebars
            .register_template_string("nuspec", NUSPEC_TEMPLATE)
            .map_err(|e| Error::GenericError(format!("Failed to register manifest template: {e}")))?;

        let data = serde_json::json!({
            "id": self.id,
            "title": self.title,
            "description": self.description,
            "authors": self.authors,
            "version": self.version.to_string(),
            "channel": self.channel,
            "main_exe": self.main_exe,
            "os": self.os,
            "os_min_version": self.os_min_version,
            "machine_architecture": self.machine_architecture,
            "rid": self.rid,
            "release_notes": self.release_notes,
            "release_notes_html": self.release_notes_html.as_deref().map(cdata_escape),
        });

        handlebars
            .render("nuspec", &data)
            .map_err(|e| Error::GenericError(format!("Failed to render manifest: {e}")))
    }

    /// Parses a manifest.
    ///
    /// `id` and `version` are required. Title defaults to the id, description
    /// to the title, authors to the id and the main executable to the id.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut path: Vec<String> = Vec::new();
        let mut fields: HashMap<String, String> = HashMap::new();

        for event in EventReader::new(xml.as_bytes()) {
            match event? {
                XmlEvent::StartElement { name, .. } => path.push(name.local_name),
                XmlEvent::EndElement { .. } => {
                    path.pop();
                }
                XmlEvent::Characters(text) | XmlEvent::CData(text) | XmlEvent::Whitespace(text) => {
                    if path.len() == 3 && path[1] == "metadata" {
                        fields.entry(path[2].clone()).or_default().push_str(&text);
                    }
                }
                _ => {}
            }
        }

        let id = trimmed(&mut fields, "id")
            .ok_or_else(|| Error::GenericError("manifest is missing 'id'".into()))?;
        let version = trimmed(&mut fields, "version")
            .ok_or_else(|| Error::GenericError("manifest is missing 'version'".into()))?;
        let version = Version::parse(&version)?;
        let title = trimmed(&mut fields, "title").unwrap_or_else(|| id.clone());
        let description = trimmed(&mut fields, "description").unwrap_or_else(|| title.clone());
        let authors = trimmed(&mut fields, "authors").unwrap_or_else(|| id.clone());
        let main_exe = trimmed(&mut fields, "mainExe").unwrap_or_else(|| id.clone());

        Ok(Self {
            title,
            description,
            authors,
            version,
            channel: trimmed(&mut fields, "channel").unwrap_or_default(),
            main_exe,
            os: trimmed(&mut fields, "os").unwrap_or_default(),
            os_min_version: trimmed(&mut fields, "osMinVersion"),
            machine_architecture: trimmed(&mut fields, "machineArchitecture"),
            rid: trimmed(&mut fields, "rid").unwrap_or_default(),
            release_notes: fields
                .remove("releaseNotes")
                .filter(|n| !n.trim().is_empty()),
            release_notes_html: fields
                .remove("releaseNotesHtml")
                .filter(|n| !n.trim().is_empty()),
            id,
        })
    }

    /// Writes the manifest to `path`.
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        let xml = self.to_xml()?;
        tokio::fs::write(path, xml)
            .await
            .fs_context("writing manifest", path)
    }

    /// Reads and parses the manifest at `path`.
    pub async fn read_from(path: &Path) -> Result<Self> {
        let xml = tokio::fs::read_to_string(path)
            .await
            .fs_context("reading manifest", path)?;
        Self::from_xml(&xml)
    }
}

fn trimmed(fields: &mut HashMap<String, String>, key: &str) -> Option<String> {
    fields
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Splits any `]]>` so the text can sit inside a CDATA section.
pub fn cdata_escape(text: &str) -> String {
    text.replace("]]>", "]]]]><![CDATA[>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> PackageManifest {
        PackageManifest {
            id: "MyApp".into(),
            title: "My <App>".into(),
            description: "Tools & things".into(),
            authors: "Kodegen".into(),
            version: Version::parse("1.0.0-stable").unwrap(),
            channel: "stable".into(),
            main_exe: "MyApp".into(),
            os: "linux".into(),
            os_min_version: None,
            machine_architecture: Some("x64".into()),
            rid: "linux-x64".into(),
            release_notes: Some("# Fixes\n\n- a < b".into()),
            release_notes_html: None,
        }
    }

    #[test]
    fn escapes_text_fields() {
        let xml = manifest().to_xml().unwrap();
        assert!(xml.contains("<title>My &lt;App&gt;</title>"));
        assert!(xml.contains("<description>Tools &amp; things</description>"));
        assert!(!xml.contains("releaseNotesHtml"));
        assert_eq!(PackageManifest::from_xml(&xml).unwrap(), manifest());
    }

    #[test]
    fn html_notes_survive_cdata_terminators() {
        let mut original = manifest();
        original.release_notes_html = Some("<p>a ]]> b</p>".into());
        let xml = original.to_xml().unwrap();
        assert!(xml.contains("<![CDATA[<p>a ]]]]><![CDATA[> b</p>]]>"));

        let parsed = PackageManifest::from_xml(&xml).unwrap();
        assert_eq!(parsed.release_notes_html.as_deref(), Some("<p>a ]]> b</p>"));
    }

    #[test]
    fn applies_defaults_when_parsing() {
        let xml = r#"<?xml version="1.0"?>
            <package><metadata>
              <id>Tool</id>
              <version>2.0.0</version>
              <title>Tool Suite</title>
            </metadata></package>"#;
        let parsed = PackageManifest::from_xml(xml).unwrap();
        assert_eq!(parsed.title, "Tool Suite");
        assert_eq!(parsed.description, "Tool Suite");
        assert_eq!(parsed.authors, "Tool");
        assert_eq!(parsed.main_exe, "Tool");
        assert_eq!(parsed.release_notes, None);
    }

    #[test]
    fn requires_id_and_version() {
        let missing_id = "<package><metadata><version>1.0.0</version></metadata></package>";
        assert!(PackageManifest::from_xml(missing_id).is_err());

        let missing_version = "<package><metadata><id>Tool</id></metadata></package>";
        assert!(PackageManifest::from_xml(missing_version).is_err());

        assert!(PackageManifest::from_xml("<package><metadata>").is_err());
    }
}
