//! Error types for packaging operations.
//!
//! Every pipeline stage reports failures through [`Error`]. Configuration
//! errors are raised before any side effect; everything else aborts the run
//! and triggers rollback in the orchestrator.

use std::{fmt::Display, io, path::PathBuf};

use super::settings::TargetOs;

/// Result type alias for packaging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building release packages.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error with additional context.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error tied to a path.
    #[error("{context} {}: {error}", path.display())]
    Fs {
        /// Operation that failed.
        context: &'static str,
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying error.
        #[source]
        error: io::Error,
    },

    /// Raw I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Path prefix error while computing relative paths.
    #[error("{0}")]
    StripError(#[from] std::path::StripPrefixError),

    /// Directory traversal error.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Archive read or write error.
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    /// Manifest parsing error.
    #[error("failed to parse manifest: {0}")]
    XmlError(#[from] xml::reader::Error),

    /// Release index serialization error.
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    /// Version parsing error.
    #[error("{0}")]
    SemverError(#[from] semver::Error),

    /// Exclusion pattern error.
    #[error("{0}")]
    GlobError(#[from] glob::PatternError),

    /// External command could not be started.
    #[error("failed to run {command}: {error}")]
    CommandFailed {
        /// Command that failed.
        command: String,
        /// Underlying error.
        error: io::Error,
    },

    /// Target runtime does not match the packager's operating system.
    #[error("runtime `{runtime}` targets {actual}, but this packager builds {expected} releases")]
    UnsupportedRuntime {
        /// Runtime identifier as supplied.
        runtime: String,
        /// OS this packager supports.
        expected: TargetOs,
        /// OS the runtime identifier names.
        actual: TargetOs,
    },

    /// Runtime identifier could not be parsed.
    #[error("invalid runtime identifier `{0}` (expected e.g. win-x64, osx-arm64, linux-x64)")]
    InvalidRuntime(String),

    /// Channel name is malformed or unusable for this package.
    #[error("invalid channel `{channel}`: {reason}")]
    InvalidChannel {
        /// Channel name.
        channel: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Version is not newer than the latest release in its channel.
    #[error("version {version} must be newer than {latest}, the latest release in channel `{channel}`")]
    VersionNotNewer {
        /// Version being packaged.
        version: semver::Version,
        /// Latest full release already present.
        latest: semver::Version,
        /// Channel name.
        channel: String,
    },

    /// Package options failed validation.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// More than one concurrently running stage failed.
    #[error("{} build stages failed: {}", .0.len(), join_errors(.0))]
    StagesFailed(Vec<Error>),

    /// Generic error.
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Returns true for errors raised while validating inputs, before any
    /// file was written.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedRuntime { .. }
                | Self::InvalidRuntime(_)
                | Self::InvalidChannel { .. }
                | Self::VersionNotNewer { .. }
                | Self::InvalidOptions(_)
        )
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Attach context to errors and missing values.
pub trait Context<T> {
    /// Wrap the error (or `None`) with a message.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Wrap the error (or `None`) with a lazily built message.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Attach the failing operation and path to I/O errors.
pub trait ErrorExt<T> {
    /// Convert an I/O error into [`Error::Fs`].
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Return early with a [`Error::GenericError`].
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError(format!($msg)))
    };
    ($err:expr $(,)?) => {
        return Err($crate::bundler::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_classified() {
        assert!(Error::InvalidRuntime("beos".into()).is_configuration());
        assert!(
            Error::UnsupportedRuntime {
                runtime: "win-x64".into(),
                expected: TargetOs::Linux,
                actual: TargetOs::Windows,
            }
            .is_configuration()
        );
        assert!(!Error::GenericError("archiver crashed".into()).is_configuration());
    }

    #[test]
    fn stage_failures_list_every_error() {
        let error = Error::StagesFailed(vec![
            Error::GenericError("portable failed".into()),
            Error::GenericError("setup failed".into()),
        ]);
        assert_eq!(
            error.to_string(),
            "2 build stages failed: portable failed; setup failed"
        );
    }

    #[test]
    fn fs_context_keeps_path() {
        let result: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let error = result.fs_context("reading manifest", "/tmp/app.nuspec").unwrap_err();
        assert_eq!(error.to_string(), "reading manifest /tmp/app.nuspec: gone");
    }
}
