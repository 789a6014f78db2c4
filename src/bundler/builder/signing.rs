//! Code signing through a user-supplied command template.
//!
//! The template names a signing tool and its arguments, e.g.
//! `signtool sign /a /fd SHA256 {{file}}` or
//! `codesign --force --sign "Developer ID" {{file}}`. Every signable file in
//! the staged application is passed to one invocation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{Progress, tool_detection::resolve_tool};
use crate::bundler::{
    Error, Result,
    platform::Signer,
    settings::TargetOs,
};

/// Placeholder replaced by the path of the file being signed.
pub const FILE_PLACEHOLDER: &str = "{{file}}";

const WINDOWS_SIGNABLE: &[&str] = &["exe", "dll", "node", "sys"];
const MACOS_SIGNABLE: &[&str] = &["dylib", "so", "node"];

/// Signer running an external command once per signable file.
#[derive(Clone, Debug)]
pub struct CommandSigner {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandSigner {
    /// Creates a signer for an already resolved program.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parses a whitespace-separated template and locates its program.
    ///
    /// Arguments without a `{{file}}` placeholder get the file appended.
    pub fn from_template(template: &str) -> Result<Self> {
        let mut parts = template.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            Error::InvalidOptions("signing template must name a program".into())
        })?;
        let program = resolve_tool(program)?;
        Ok(Self::new(program, parts.map(str::to_string).collect()))
    }

    /// Arguments for signing `file`.
    pub fn args_for(&self, file: &Path) -> Vec<String> {
        let file = file.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(FILE_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(FILE_PLACEHOLDER, &file)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(file.into_owned());
        }
        args
    }

    async fn sign_file(&self, file: &Path) -> Result<()> {
        let args = self.args_for(file);
        log::debug!("Signing {}", file.display());

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|error| Error::CommandFailed {
                command: self.program.display().to_string(),
                error,
            })?;

        if !output.status.success() {
            crate::bail!(
                "signing {} failed (exit code: {:?}): {}",
                file.display(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

/// Returns true if `path` should be signed for `os`.
///
/// The main executable on macOS and Linux has no extension; extensionless
/// files with the executable bit are therefore signed on macOS too.
pub fn is_signable(path: &Path, os: TargetOs) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match (os, ext.as_deref()) {
        (TargetOs::Windows, Some(ext)) => WINDOWS_SIGNABLE.contains(&ext),
        (TargetOs::MacOs, Some(ext)) => MACOS_SIGNABLE.contains(&ext),
        (TargetOs::MacOs, None) => is_executable(path),
        _ => false,
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

#[async_trait]
impl Signer for CommandSigner {
    async fn sign_directory(&self, dir: &Path, os: TargetOs, progress: Progress) -> Result<()> {
        let root = dir.to_path_buf();
        let files: Vec<PathBuf> = tokio::task::spawn_blocking(move || {
            walkdir::WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        is_signable(entry.path(), os).then(|| Ok(entry.into_path()))
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(Error::from(e))),
                })
                .collect::<Result<Vec<_>>>()
        })
        .await
        .map_err(|e| Error::GenericError(format!("Signing scan task panicked: {}", e)))??;

        if files.is_empty() {
            log::debug!("No signable files in {}", dir.display());
            progress.report(100);
            return Ok(());
        }

        for (index, file) in files.iter().enumerate() {
            self.sign_file(file).await?;
            progress.report_fraction(index + 1, files.len());
        }

        log::info!("✓ Signed {} files", files.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_placeholder() {
        let signer = CommandSigner::new(
            "signtool",
            vec!["sign".into(), "/f".into(), "--file={{file}}".into()],
        );
        assert_eq!(
            signer.args_for(Path::new("C:/app/MyApp.exe")),
            ["sign", "/f", "--file=C:/app/MyApp.exe"]
        );
    }

    #[test]
    fn appends_file_without_placeholder() {
        let signer = CommandSigner::new("codesign", vec!["--sign".into(), "dev".into()]);
        assert_eq!(
            signer.args_for(Path::new("/app/lib.dylib")),
            ["--sign", "dev", "/app/lib.dylib"]
        );
    }

    #[test]
    fn signable_extensions_depend_on_os() {
        assert!(is_signable(Path::new("MyApp.EXE"), TargetOs::Windows));
        assert!(is_signable(Path::new("native.node"), TargetOs::Windows));
        assert!(!is_signable(Path::new("data.json"), TargetOs::Windows));
        assert!(is_signable(Path::new("libcore.dylib"), TargetOs::MacOs));
        assert!(!is_signable(Path::new("core.dll"), TargetOs::MacOs));
        assert!(!is_signable(Path::new("core.so"), TargetOs::Linux));
    }

    #[test]
    fn empty_template_is_rejected() {
        assert!(matches!(
            CommandSigner::from_template("   "),
            Err(Error::InvalidOptions(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_command_per_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("MyApp.exe"), b"exe").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"txt").unwrap();

        let signer = CommandSigner::from_template("true").unwrap();
        signer
            .sign_directory(dir.path(), TargetOs::Windows, Progress::none())
            .await
            .unwrap();

        let failing = CommandSigner::from_template("false").unwrap();
        assert!(
            failing
                .sign_directory(dir.path(), TargetOs::Windows, Progress::none())
                .await
                .is_err()
        );
    }
}
