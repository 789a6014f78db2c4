//! Packaging pipeline orchestration.
//!
//! This module provides the [`Packager`] that sequences the build stages of a
//! release and enforces its all-or-nothing transaction.

use std::{
    fmt,
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use semver::Version;
use tokio::task::JoinSet;

use super::{Progress, RunContext};
use crate::bundler::{
    Error, Result,
    error::ErrorExt,
    package::{self, PackageManifest, VERSION_MARKER_FILE},
    platform::{
        ArchivePortableBuilder, Archiver, DeltaBuilder, FileDeltaBuilder, PortableBuilder,
        ScriptSetupBuilder, SetupBuilder, Signer, ZipArchiver,
    },
    release::{ReleaseIndex, ReleaseRecord, find_previous_full, resolve_channel, resolve_version},
    settings::{DeltaMode, PackOptions, TargetOs},
    utils::fs,
};

/// Pipeline stages, in dependency order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum PackStage {
    /// Copy of the application into the staging area
    Preprocess,
    /// In-place signing of the staged application
    Sign,
    /// Portable package build
    Portable,
    /// Full release archive build
    FullRelease,
    /// Setup package build
    Setup,
    /// Delta package build
    Delta,
    /// Commit of all outputs and the release index
    Finalize,
}

impl fmt::Display for PackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preprocess => "preprocess",
            Self::Sign => "sign",
            Self::Portable => "portable",
            Self::FullRelease => "full release",
            Self::Setup => "setup",
            Self::Delta => "delta",
            Self::Finalize => "finalize",
        })
    }
}

/// Callback receiving `(stage, percent)` progress updates.
pub type StageObserver = Arc<dyn Fn(PackStage, u8) + Send + Sync>;

/// Artifacts produced by a successful run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackOutput {
    /// Resolved (channel-suffixed) version
    pub version: Version,
    /// Resolved channel
    pub channel: String,
    /// Registered full release
    pub full_release: ReleaseRecord,
    /// Registered delta release, when one was built
    pub delta_release: Option<ReleaseRecord>,
    /// Committed portable package
    pub portable: Option<PathBuf>,
    /// Committed setup package
    pub setup: Option<PathBuf>,
}

/// Result of a concurrently running branch.
#[derive(Debug)]
enum BranchOutput {
    Portable(PathBuf),
    Setup(PathBuf),
    Delta(ReleaseRecord),
}

type StageFailure = (Option<PackStage>, Error);

/// Concurrently running branches, joined as a barrier.
struct Branches {
    tasks: JoinSet<(PackStage, Result<BranchOutput>)>,
}

impl Branches {
    fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
        }
    }

    fn spawn<F>(&mut self, stage: PackStage, future: F)
    where
        F: Future<Output = Result<BranchOutput>> + Send + 'static,
    {
        log::debug!("Started {} stage", stage);
        self.tasks.spawn(async move { (stage, future.await) });
    }

    /// Waits for every branch, successful or not.
    async fn join_all(mut self) -> (Vec<BranchOutput>, Vec<StageFailure>) {
        let mut outputs = Vec::new();
        let mut failures = Vec::new();

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((_, Ok(output))) => outputs.push(output),
                Ok((stage, Err(error))) => {
                    log::error!("{} stage failed: {}", stage, error);
                    failures.push((Some(stage), error));
                }
                Err(join_error) => {
                    log::error!("Build stage task panicked: {}", join_error);
                    failures.push((
                        None,
                        Error::GenericError(format!("build stage task panicked: {join_error}")),
                    ));
                }
            }
        }
        (outputs, failures)
    }
}

/// Combines branch failures: one is returned as is, several as
/// [`Error::StagesFailed`] ordered by stage.
fn aggregate_failures(mut failures: Vec<StageFailure>) -> Error {
    failures.sort_by_key(|(stage, _)| (stage.is_none(), *stage));
    if failures.len() == 1 {
        if let Some((_, error)) = failures.pop() {
            return error;
        }
    }
    Error::StagesFailed(failures.into_iter().map(|(_, error)| error).collect())
}

/// Release packaging orchestrator.
///
/// Sequences the pipeline stages:
///
/// ```text
/// Preprocess → Sign → ┬→ Portable ─────────────┬→ Finalize
///                     └→ Full ─┬→ Setup ───────┤
///                              └→ Delta ───────┘
/// ```
///
/// Portable, setup and delta builds run concurrently. Portable and setup
/// outputs stay at `.incomplete` paths until Finalize renames them; any
/// failure deletes them and rolls back the release index instead.
///
/// Finalize saves the release feed before renaming the outputs. Once the
/// feed is saved the run is committed: a later rename failure leaves the
/// registered releases in place and only removes leftover temporaries.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use kodegen_bundler_pack::bundler::{LocalReleaseIndex, PackOptionsBuilder, Packager};
///
/// # async fn example() -> kodegen_bundler_pack::bundler::Result<()> {
/// let options = PackOptionsBuilder::new()
///     .package_id("MyApp")
///     .version("1.0.0")
///     .package_dir("target/release/app")
///     .release_dir("Releases")
///     .build()?;
///
/// let index = Arc::new(LocalReleaseIndex::new(options.release_dir()));
/// let output = Packager::for_current_os(index).run(options).await?;
/// println!("Packaged {} into channel {}", output.version, output.channel);
/// # Ok(())
/// # }
/// ```
pub struct Packager {
    supported_os: TargetOs,
    index: Arc<dyn ReleaseIndex>,
    archiver: Arc<dyn Archiver>,
    delta: Arc<dyn DeltaBuilder>,
    setup: Arc<dyn SetupBuilder>,
    portable: Arc<dyn PortableBuilder>,
    signer: Option<Arc<dyn Signer>>,
    observer: Option<StageObserver>,
}

impl fmt::Debug for Packager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packager")
            .field("supported_os", &self.supported_os)
            .field("signer", &self.signer.as_ref().map(|_| "<Signer>"))
            .field("observer", &self.observer.as_ref().map(|_| "<StageObserver>"))
            .finish_non_exhaustive()
    }
}

impl Packager {
    /// Creates a packager for `supported_os` with the default collaborators.
    pub fn new(supported_os: TargetOs, index: Arc<dyn ReleaseIndex>) -> Self {
        let archiver: Arc<dyn Archiver> = Arc::new(ZipArchiver);
        Self {
            supported_os,
            index,
            portable: Arc::new(ArchivePortableBuilder::new(archiver.clone())),
            archiver,
            delta: Arc::new(FileDeltaBuilder),
            setup: Arc::new(ScriptSetupBuilder),
            signer: None,
            observer: None,
        }
    }

    /// Creates a packager for the operating system of the running process.
    pub fn for_current_os(index: Arc<dyn ReleaseIndex>) -> Self {
        Self::new(TargetOs::current(), index)
    }

    /// Replaces the archiver used for full releases.
    ///
    /// The default portable builder keeps its own archiver; replace it with
    /// [`with_portable_builder`](Self::with_portable_builder).
    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Replaces the delta builder.
    pub fn with_delta_builder(mut self, delta: Arc<dyn DeltaBuilder>) -> Self {
        self.delta = delta;
        self
    }

    /// Replaces the setup builder.
    pub fn with_setup_builder(mut self, setup: Arc<dyn SetupBuilder>) -> Self {
        self.setup = setup;
        self
    }

    /// Replaces the portable builder.
    pub fn with_portable_builder(mut self, portable: Arc<dyn PortableBuilder>) -> Self {
        self.portable = portable;
        self
    }

    /// Sets the signer used on platforms that require signing.
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Observes per-stage progress.
    pub fn with_progress(mut self, observer: impl Fn(PackStage, u8) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Operating system this packager builds releases for.
    pub fn supported_os(&self) -> TargetOs {
        self.supported_os
    }

    /// Packages one release.
    ///
    /// # Process
    ///
    /// 1. Validates options; configuration errors return before any file is written
    /// 2. Creates a fresh staging area
    /// 3. Runs the pipeline stages
    /// 4. On failure before the release feed is saved, deletes incomplete
    ///    outputs and rolls back the release index
    /// 5. Removes the staging area
    ///
    /// # Errors
    ///
    /// The first failing stage's error, unmodified, or [`Error::StagesFailed`]
    /// when several concurrent stages failed.
    pub async fn run(&self, options: PackOptions) -> Result<PackOutput> {
        let (options, channel, version, manifest) = self.validate(options).await?;
        let release_dir_existed = options.release_dir().exists();

        let staging = tempfile::Builder::new()
            .prefix("kodegen-pack-")
            .tempdir()
            .fs_context("creating staging directory", std::env::temp_dir())?;
        log::debug!("Staging in {}", staging.path().display());

        let context = Arc::new(RunContext::new(
            options,
            channel,
            version,
            manifest,
            staging.path().to_path_buf(),
            release_dir_existed,
        ));

        let result = match self.execute(&context).await {
            Ok(output) => Ok(output),
            Err(error) if context.is_committed() => {
                log::error!(
                    "Release feed saved but outputs could not be committed: {}",
                    error
                );
                context.pending().discard().await;
                Err(error)
            }
            Err(error) => {
                log::error!("Packaging failed, rolling back: {}", error);
                self.rollback(&context).await;
                Err(error)
            }
        };

        if let Err(e) = staging.close() {
            log::warn!("Failed to remove staging directory: {}", e);
        }
        result
    }

    async fn validate(
        &self,
        options: PackOptions,
    ) -> Result<(PackOptions, String, Version, PackageManifest)> {
        let runtime = options.runtime();
        if runtime.os != self.supported_os {
            return Err(Error::UnsupportedRuntime {
                runtime: runtime.identifier.clone(),
                expected: self.supported_os,
                actual: runtime.os,
            });
        }

        let channel = resolve_channel(options.channel(), runtime.os)?;
        let version = resolve_version(options.version(), runtime.os, &channel)?;

        if !options.package_dir().is_dir() {
            return Err(Error::InvalidOptions(format!(
                "package directory {} does not exist",
                options.package_dir().display()
            )));
        }
        let main_exe = options.package_dir().join(options.main_exe());
        if !main_exe.is_file() {
            return Err(Error::InvalidOptions(format!(
                "main executable {} not found in {}",
                options.main_exe(),
                options.package_dir().display()
            )));
        }
        for (name, path) in options.metadata_files() {
            if !path.is_file() {
                return Err(Error::InvalidOptions(format!(
                    "{name} source {} does not exist",
                    path.display()
                )));
            }
        }

        let release_notes = match options.release_notes() {
            Some(path) => Some(
                tokio::fs::read_to_string(path)
                    .await
                    .fs_context("reading release notes", path)?,
            ),
            None => None,
        };

        self.index
            .validate_channel_for_packaging(options.package_id(), &version, &channel, runtime)
            .await?;

        let manifest = PackageManifest::from_options(&options, &version, &channel, release_notes);
        log::info!(
            "Packaging {} {} for {} (channel: {})",
            manifest.id,
            version,
            runtime,
            channel
        );
        Ok((options, channel, version, manifest))
    }

    async fn execute(&self, ctx: &Arc<RunContext>) -> Result<PackOutput> {
        let package_dir = self.preprocess(ctx).await?;
        self.sign(ctx, &package_dir).await?;

        let mut branches = Branches::new();
        branches.spawn(
            PackStage::Portable,
            portable_stage(
                ctx.clone(),
                self.index.clone(),
                self.portable.clone(),
                package_dir.clone(),
                self.stage_progress(PackStage::Portable),
            ),
        );

        let sequential: std::result::Result<ReleaseRecord, (PackStage, Error)> = async {
            let full = self
                .build_full_release(ctx, &package_dir)
                .await
                .map_err(|e| (PackStage::FullRelease, e))?;

            branches.spawn(
                PackStage::Setup,
                setup_stage(
                    ctx.clone(),
                    self.index.clone(),
                    self.setup.clone(),
                    self.stage_progress(PackStage::Setup),
                ),
            );

            let previous = self
                .delta_base(ctx)
                .await
                .map_err(|e| (PackStage::Delta, e))?;
            if let Some(previous) = previous {
                branches.spawn(
                    PackStage::Delta,
                    delta_stage(
                        ctx.clone(),
                        self.index.clone(),
                        self.delta.clone(),
                        previous,
                        self.stage_progress(PackStage::Delta),
                    ),
                );
            }
            Ok(full)
        }
        .await;

        let (outputs, mut failures) = branches.join_all().await;
        let full_release = match sequential {
            Ok(full) if failures.is_empty() => full,
            Ok(_) => return Err(aggregate_failures(failures)),
            Err((stage, error)) => {
                log::error!("{} stage failed: {}", stage, error);
                failures.push((Some(stage), error));
                return Err(aggregate_failures(failures));
            }
        };

        let mut output = PackOutput {
            version: ctx.version().clone(),
            channel: ctx.channel().to_string(),
            full_release,
            delta_release: None,
            portable: None,
            setup: None,
        };
        for branch in outputs {
            match branch {
                BranchOutput::Portable(path) => output.portable = Some(path),
                BranchOutput::Setup(path) => output.setup = Some(path),
                BranchOutput::Delta(record) => output.delta_release = Some(record),
            }
        }

        self.finalize(ctx).await?;
        Ok(output)
    }

    async fn preprocess(&self, ctx: &RunContext) -> Result<PathBuf> {
        let progress = self.stage_progress(PackStage::Preprocess);
        let options = ctx.options();
        let target = ctx
            .staging_subdir("preprocess")
            .join(options.package_id());

        log::info!("Preprocessing {}", options.package_dir().display());
        fs::copy_files(options.package_dir(), &target, progress.scoped(0, 90), true).await?;

        if !target.join(options.main_exe()).is_file() {
            return Err(Error::GenericError(format!(
                "main executable {} was excluded from the package",
                options.main_exe()
            )));
        }

        ctx.manifest()
            .write_to(&target.join(VERSION_MARKER_FILE))
            .await?;
        progress.report(100);
        Ok(target)
    }

    async fn sign(&self, ctx: &RunContext, package_dir: &Path) -> Result<()> {
        let progress = self.stage_progress(PackStage::Sign);
        let os = ctx.options().runtime().os;

        if !os.requires_signing() {
            log::debug!("Signing not required for {}", os);
        } else if let Some(signer) = &self.signer {
            log::info!("Signing {}", package_dir.display());
            signer.sign_directory(package_dir, os, progress.clone()).await?;
        } else {
            log::warn!("No signer configured, {} binaries will not be signed", os);
        }

        progress.report(100);
        Ok(())
    }

    async fn build_full_release(&self, ctx: &RunContext, package_dir: &Path) -> Result<ReleaseRecord> {
        let progress = self.stage_progress(PackStage::FullRelease);
        let options = ctx.options();
        let output = ctx.full_release_path();

        fs::create_dir_all(options.release_dir(), false).await?;
        fs::remove_file_if_exists(&output).await?;

        let result = async {
            package::assemble_release_archive(
                self.archiver.as_ref(),
                package_dir,
                ctx.manifest(),
                options.metadata_files(),
                &ctx.staging_subdir("release"),
                &output,
                progress,
            )
            .await?;
            self.index.add_new_release(&output, ctx.channel()).await
        }
        .await;

        if result.is_err() {
            remove_partial_output(&output).await;
        }
        result
    }

    /// Previous full release to diff against, if a delta should be built.
    async fn delta_base(&self, ctx: &RunContext) -> Result<Option<PathBuf>> {
        if ctx.options().delta_mode() == DeltaMode::None {
            log::debug!("Delta packages disabled");
            return Ok(None);
        }

        let options = ctx.options();
        let Some(previous) = find_previous_full(
            self.index.as_ref(),
            options.package_id(),
            ctx.version(),
            ctx.channel(),
        )
        .await?
        else {
            log::info!("No previous release in channel {}, skipping delta", ctx.channel());
            return Ok(None);
        };

        let path = options.release_dir().join(&previous.file_name);
        if !path.is_file() {
            log::warn!(
                "Previous release {} is missing from {}, skipping delta",
                previous.file_name,
                options.release_dir().display()
            );
            return Ok(None);
        }
        Ok(Some(path))
    }

    async fn finalize(&self, ctx: &RunContext) -> Result<()> {
        let progress = self.stage_progress(PackStage::Finalize);
        ctx.pending().ensure_ready().await?;

        self.index.save_releases_files().await?;
        ctx.mark_committed();
        progress.report(50);

        let committed = ctx.pending().commit().await?;
        for path in &committed {
            log::info!("✓ Created {}", path.display());
        }
        progress.report(100);
        Ok(())
    }

    async fn rollback(&self, ctx: &RunContext) {
        ctx.pending().discard().await;

        if let Err(e) = self.index.rollback_new_releases().await {
            log::warn!("Failed to roll back release index: {}", e);
        }

        if !ctx.release_dir_existed() {
            // Only succeeds when nothing else was left behind.
            let _ = tokio::fs::remove_dir(ctx.options().release_dir()).await;
        }
    }

    fn stage_progress(&self, stage: PackStage) -> Progress {
        match &self.observer {
            Some(observer) => {
                let observer = observer.clone();
                Progress::new(move |percent| observer(stage, percent))
            }
            None => Progress::none(),
        }
    }
}

async fn remove_partial_output(path: &Path) {
    if let Err(e) = fs::remove_file_if_exists(path).await {
        log::warn!("Failed to remove partial output {}: {}", path.display(), e);
    }
}

async fn portable_stage(
    ctx: Arc<RunContext>,
    index: Arc<dyn ReleaseIndex>,
    builder: Arc<dyn PortableBuilder>,
    package_dir: PathBuf,
    progress: Progress,
) -> Result<BranchOutput> {
    let options = ctx.options();
    let final_path =
        index.suggested_portable_path(options.package_id(), ctx.channel(), options.runtime());
    let temp = ctx.pending().begin(&final_path).await?;

    builder
        .build_portable(
            ctx.manifest(),
            &package_dir,
            &ctx.staging_subdir("portable"),
            &temp,
            progress,
        )
        .await?;

    ctx.pending().complete(&temp).await;
    Ok(BranchOutput::Portable(final_path))
}

async fn setup_stage(
    ctx: Arc<RunContext>,
    index: Arc<dyn ReleaseIndex>,
    builder: Arc<dyn SetupBuilder>,
    progress: Progress,
) -> Result<BranchOutput> {
    let options = ctx.options();
    let final_path =
        index.suggested_setup_path(options.package_id(), ctx.channel(), options.runtime());
    let temp = ctx.pending().begin(&final_path).await?;

    builder
        .build_setup(
            ctx.manifest(),
            &ctx.full_release_path(),
            &ctx.staging_subdir("setup"),
            &temp,
            progress,
        )
        .await?;

    ctx.pending().complete(&temp).await;
    Ok(BranchOutput::Setup(final_path))
}

async fn delta_stage(
    ctx: Arc<RunContext>,
    index: Arc<dyn ReleaseIndex>,
    builder: Arc<dyn DeltaBuilder>,
    previous: PathBuf,
    progress: Progress,
) -> Result<BranchOutput> {
    let output = ctx.delta_release_path();
    fs::remove_file_if_exists(&output).await?;

    let result = async {
        let (path, stats) = builder
            .create_delta_package(
                &previous,
                &ctx.full_release_path(),
                &output,
                ctx.options().delta_mode(),
                progress,
            )
            .await?;
        log::debug!("Delta contents: {:?}", stats);
        index.add_new_release(&path, ctx.channel()).await
    }
    .await;

    match result {
        Ok(record) => Ok(BranchOutput::Delta(record)),
        Err(error) => {
            remove_partial_output(&output).await;
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_failure_is_returned_unmodified() {
        let error = aggregate_failures(vec![(
            Some(PackStage::Delta),
            Error::InvalidRuntime("x".into()),
        )]);
        assert!(matches!(error, Error::InvalidRuntime(_)));
    }

    #[test]
    fn several_failures_are_ordered_by_stage() {
        let error = aggregate_failures(vec![
            (None, Error::GenericError("panic".into())),
            (Some(PackStage::Delta), Error::GenericError("delta".into())),
            (Some(PackStage::Portable), Error::GenericError("portable".into())),
        ]);
        let Error::StagesFailed(errors) = error else {
            panic!("expected aggregated failure");
        };
        let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(messages, ["portable", "delta", "panic"]);
    }

    #[test]
    fn stages_order_by_pipeline_position() {
        assert!(PackStage::Preprocess < PackStage::Sign);
        assert!(PackStage::FullRelease < PackStage::Setup);
        assert!(PackStage::Delta < PackStage::Finalize);
        assert_eq!(PackStage::FullRelease.to_string(), "full release");
    }
}
