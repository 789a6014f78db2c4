//! Release packager library for self-updating applications
//!
//! This library turns a built application directory into:
//! - Full release archives (`.nupkg`) registered in a per-channel feed
//! - Delta packages against the previous release of the channel
//! - Portable archives and setup packages
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod bundler;
pub mod cli;
pub mod error;
pub mod metadata;

// Re-export commonly used types
pub use error::{BundlerError, CliError, Result};
