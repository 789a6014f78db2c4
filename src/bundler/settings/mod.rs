//! Configuration structures for packaging runs.
//!
//! This module provides the immutable [`PackOptions`] consumed by the
//! orchestrator, its [`PackOptionsBuilder`], and the runtime identifier types
//! describing the target platform.

mod arch;
mod builder;
mod options;
mod runtime;

pub use arch::Arch;
pub use builder::PackOptionsBuilder;
pub use options::{DeltaMode, PackOptions};
pub use runtime::{RuntimeInfo, TargetOs};
