//! Top-level error types for the command line surface.
//!
//! Pipeline failures are [`crate::bundler::Error`]; this module wraps them
//! together with argument and configuration errors and maps them to exit codes.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, BundlerError>;

/// Exit code for argument and configuration errors
pub const EXIT_CONFIGURATION: i32 = 2;

/// Exit code for every other failure
pub const EXIT_FAILURE: i32 = 1;

/// Main error type for all CLI operations
#[derive(Error, Debug)]
pub enum BundlerError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Packaging pipeline errors
    #[error("Packaging error: {0}")]
    Pack(#[from] crate::bundler::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Missing required argument
    #[error("Missing required argument: {argument}")]
    MissingArgument {
        /// Argument name
        argument: String,
    },
}

impl BundlerError {
    /// Whether the error was caused by the caller's input rather than by the run itself.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Cli(_) | Self::Toml(_) | Self::Anyhow(_) => true,
            Self::Pack(e) => e.is_configuration(),
            Self::Io(_) => false,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_configuration() {
            EXIT_CONFIGURATION
        } else {
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_exit_with_two() {
        let missing = BundlerError::from(CliError::MissingArgument {
            argument: "--pack-id".into(),
        });
        assert_eq!(missing.exit_code(), EXIT_CONFIGURATION);

        let channel = BundlerError::from(crate::bundler::Error::InvalidChannel {
            channel: "a b".into(),
            reason: "bad".into(),
        });
        assert_eq!(channel.exit_code(), EXIT_CONFIGURATION);
    }

    #[test]
    fn runtime_failures_exit_with_one() {
        let io = BundlerError::from(std::io::Error::other("disk full"));
        assert_eq!(io.exit_code(), EXIT_FAILURE);

        let stage = BundlerError::from(crate::bundler::Error::GenericError("zip".into()));
        assert_eq!(stage.exit_code(), EXIT_FAILURE);
    }
}
