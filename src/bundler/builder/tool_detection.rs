//! External tool detection.
//!
//! Resolves the programs named by signing templates, either as explicit paths
//! or by searching `PATH`.

use std::path::{Path, PathBuf};

use crate::bundler::{Error, Result};

/// Resolves `name` to an executable path.
///
/// Names containing a path separator must point at an existing file; bare
/// names are looked up on `PATH`.
pub fn resolve_tool(name: &str) -> Result<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        if candidate.is_file() {
            log::debug!("Using tool at: {}", candidate.display());
            return Ok(candidate.to_path_buf());
        }
        return Err(Error::GenericError(format!(
            "tool {} does not exist",
            candidate.display()
        )));
    }

    match which::which(name) {
        Ok(path) => {
            log::debug!("Found {} at: {}", name, path.display());
            Ok(path)
        }
        Err(e) => Err(Error::GenericError(format!(
            "{name} not found in PATH: {e}"
        ))),
    }
}
