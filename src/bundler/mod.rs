//! Release packaging for self-updating applications.
//!
//! The [`Packager`] turns a directory holding a built application into:
//!
//! - a full release archive (`{id}-{version}-{os}-full.nupkg`)
//! - a delta against the previous full release of the channel
//! - a portable archive
//! - a setup package
//!
//! and registers the releases in a [`ReleaseIndex`]. A run either publishes
//! every artifact and the updated index, or leaves the release directory as
//! it found it.

pub mod builder;
pub mod error;
pub mod package;
pub mod platform;
pub mod release;
pub mod settings;
pub mod utils;

pub use builder::{
    CommandSigner, PackOutput, PackStage, Packager, PendingCommit, Progress, StageObserver,
};
pub use error::{Context, Error, ErrorExt, Result};
pub use package::PackageManifest;
pub use platform::{
    ArchivePortableBuilder, Archiver, DeltaBuilder, DeltaStats, FileDeltaBuilder,
    PortableBuilder, ScriptSetupBuilder, SetupBuilder, Signer, ZipArchiver,
};
pub use release::{LocalReleaseIndex, ReleaseFeed, ReleaseIndex, ReleaseKind, ReleaseRecord};
pub use settings::{Arch, DeltaMode, PackOptions, PackOptionsBuilder, RuntimeInfo, TargetOs};
