//! Release pipeline orchestration and coordination.
//!
//! This module provides the [`Packager`] orchestrator that turns an
//! application directory into release artifacts.
//!
//! # Overview
//!
//! The packager:
//! 1. Validates [`PackOptions`](crate::bundler::PackOptions) and resolves channel and version
//! 2. Copies and signs the application in a private staging area
//! 3. Builds the full release, then portable, setup and delta artifacts
//! 4. Commits every output and the release index together, or none of them
//! 5. Returns a [`PackOutput`] describing what was published
//!
//! # Module Organization
//!
//! - [`checksum`] - SHA-256 of registered artifacts
//! - [`commit`] - `.incomplete` outputs awaiting the commit point
//! - [`context`] - Per-run state shared by the stages
//! - [`orchestrator`] - [`Packager`] and the stage graph
//! - [`progress`] - Scoped percentage reporting
//! - [`signing`] - Sign-template based [`CommandSigner`]
//! - [`tool_detection`] - Locating external tools

mod checksum;
mod commit;
mod context;
mod orchestrator;
mod progress;
mod signing;
mod tool_detection;

pub use checksum::calculate_sha256;
pub use commit::{INCOMPLETE_SUFFIX, PendingCommit, incomplete_path};
pub use context::RunContext;
pub use orchestrator::{PackOutput, PackStage, Packager, StageObserver};
pub use progress::{Progress, ProgressSink};
pub use signing::{CommandSigner, FILE_PLACEHOLDER, is_signable};
pub use tool_detection::resolve_tool;
