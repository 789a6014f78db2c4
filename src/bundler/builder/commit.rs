//! Deferred publication of build outputs.
//!
//! Artifacts other than the full release are written to `<final>.incomplete`
//! and only renamed into place by [`PendingCommit::commit`] once every stage
//! has succeeded. On failure [`PendingCommit::discard`] removes the temporary
//! files, leaving the release directory untouched.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::Mutex;

use crate::bundler::{
    error::{ErrorExt, Result},
    utils::fs,
};

/// Suffix marking an artifact that is not yet safe to consume.
pub const INCOMPLETE_SUFFIX: &str = ".incomplete";

/// Returns `<path>.incomplete`.
pub fn incomplete_path(final_path: &Path) -> PathBuf {
    let mut name = OsString::from(final_path.as_os_str());
    name.push(INCOMPLETE_SUFFIX);
    PathBuf::from(name)
}

#[derive(Debug)]
struct PendingOutput {
    temp: PathBuf,
    final_path: PathBuf,
    ready: bool,
}

/// Ordered set of outputs awaiting the commit point.
///
/// Cloning yields another handle to the same set, so concurrently running
/// stages can register their outputs.
#[derive(Clone, Debug, Default)]
pub struct PendingCommit {
    outputs: Arc<Mutex<Vec<PendingOutput>>>,
}

impl PendingCommit {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an output destined for `final_path`.
    ///
    /// Creates the parent directory, deletes any stale temporary file left by
    /// an earlier run and returns the `.incomplete` path to write to. The entry
    /// is tracked immediately so a failing stage still gets cleaned up.
    pub async fn begin(&self, final_path: &Path) -> Result<PathBuf> {
        let temp = incomplete_path(final_path);
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .fs_context("creating output directory", parent)?;
        }
        fs::remove_file_if_exists(&temp).await?;

        self.outputs.lock().await.push(PendingOutput {
            temp: temp.clone(),
            final_path: final_path.to_path_buf(),
            ready: false,
        });
        Ok(temp)
    }

    /// Marks the output written to `temp` as fully produced.
    pub async fn complete(&self, temp: &Path) {
        let mut outputs = self.outputs.lock().await;
        if let Some(output) = outputs.iter_mut().find(|o| o.temp == temp) {
            output.ready = true;
        }
    }

    /// Number of tracked outputs.
    pub async fn len(&self) -> usize {
        self.outputs.lock().await.len()
    }

    /// Whether no outputs are tracked.
    pub async fn is_empty(&self) -> bool {
        self.outputs.lock().await.is_empty()
    }

    /// Fails if an output was started but never completed.
    pub async fn ensure_ready(&self) -> Result<()> {
        ensure_all_ready(&self.outputs.lock().await)
    }

    /// Renames every output into place, in registration order.
    ///
    /// # Errors
    ///
    /// Fails without renaming anything if an output was started but never
    /// completed. A failed rename leaves the remaining temporaries in place
    /// for [`discard`](Self::discard).
    pub async fn commit(&self) -> Result<Vec<PathBuf>> {
        let mut outputs = self.outputs.lock().await;
        ensure_all_ready(&outputs)?;

        let mut committed = Vec::with_capacity(outputs.len());
        for output in outputs.iter() {
            tokio::fs::rename(&output.temp, &output.final_path)
                .await
                .fs_context("committing output", &output.final_path)?;
            log::debug!("Committed {}", output.final_path.display());
            committed.push(output.final_path.clone());
        }
        outputs.clear();
        Ok(committed)
    }

    /// Deletes every temporary file still present.
    ///
    /// Failures are logged and never returned.
    pub async fn discard(&self) {
        let mut outputs = self.outputs.lock().await;
        for output in outputs.drain(..) {
            if let Err(e) = fs::remove_file_if_exists(&output.temp).await {
                log::warn!(
                    "Failed to remove incomplete output {}: {}",
                    output.temp.display(),
                    e
                );
            }
        }
    }
}

fn ensure_all_ready(outputs: &[PendingOutput]) -> Result<()> {
    if let Some(unfinished) = outputs.iter().find(|o| !o.ready) {
        crate::bail!(
            "output {} was never completed",
            unfinished.final_path.display()
        );
    }
    Ok(())
}
