//! Handlebars templates for files generated inside release packages.

/// Package manifest (`{id}.nuspec`).
///
/// Text fields use the default HTML escaping, which is valid XML. The
/// rendered release notes are emitted raw inside a CDATA section and must be
/// pre-escaped with [`cdata_escape`](super::manifest::cdata_escape).
pub const NUSPEC_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2010/07/nuspec.xsd">
  <metadata>
    <id>{{id}}</id>
    <title>{{title}}</title>
    <description>{{description}}</description>
    <authors>{{authors}}</authors>
    <version>{{version}}</version>
    <channel>{{channel}}</channel>
    <mainExe>{{main_exe}}</mainExe>
    <os>{{os}}</os>
{{#if os_min_version}}
    <osMinVersion>{{os_min_version}}</osMinVersion>
{{/if}}
{{#if machine_architecture}}
    <machineArchitecture>{{machine_architecture}}</machineArchitecture>
{{/if}}
    <rid>{{rid}}</rid>
{{#if release_notes}}
    <releaseNotes>{{release_notes}}</releaseNotes>
{{/if}}
{{#if release_notes_html}}
    <releaseNotesHtml><![CDATA[{{{release_notes_html}}}]]></releaseNotesHtml>
{{/if}}
  </metadata>
</package>
"#;

/// `[Content_Types].xml` declaring a generic binary type per extension.
pub const CONTENT_TYPES_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
{{#each extensions}}
  <Default Extension="{{this}}" ContentType="application/octet" />
{{/each}}
</Types>
"#;

/// `_rels/.rels` linking the package root to its manifest.
pub const RELS_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Type="http://schemas.microsoft.com/packaging/2010/07/manifest" Target="/{{manifest}}" Id="{{id}}" />
</Relationships>
"#;

/// `install.sh` shipped inside setup archives. Rendered without escaping;
/// every value must already be a single-quoted shell word.
pub const INSTALL_SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
# Installs a packaged application release
set -e

APP_ID={{id}}
APP_TITLE={{title}}
APP_VERSION={{version}}
APP_CHANNEL={{channel}}
PACKAGE_FILE={{package_file}}
MAIN_EXE={{main_exe}}

DEFAULT_PREFIX="$HOME/.local/share/$APP_ID"
PREFIX="${1:-$DEFAULT_PREFIX}"
HERE="$(cd "$(dirname "$0")" && pwd)"

mkdir -p "$PREFIX/packages"
cp "$HERE/$PACKAGE_FILE" "$PREFIX/packages/"

rm -rf "$PREFIX/current"
mkdir -p "$PREFIX/current"
cd "$PREFIX/current"
unzip -q "$PREFIX/packages/$PACKAGE_FILE" 'lib/app/*'
cp -R lib/app/. .
rm -rf lib

chmod +x "$PREFIX/current/$MAIN_EXE"
echo "Installed $APP_TITLE $APP_VERSION ($APP_CHANNEL) to $PREFIX/current"
"#;
