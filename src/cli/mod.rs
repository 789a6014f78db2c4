//! Command line interface for the release packager.
//!
//! Parses arguments, merges them with the optional configuration file and
//! runs one [`Packager`] invocation.

mod args;

pub use args::Args;

use std::sync::Arc;

use path_absolutize::Absolutize;

use crate::bundler::{
    CommandSigner, DeltaMode, LocalReleaseIndex, PackOptions, PackOptionsBuilder, PackOutput,
    Packager,
};
use crate::error::{CliError, Result};
use crate::metadata::{discover_pack_config, load_pack_config};

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    run_with(Args::parse_args()).await
}

/// Runs the packager for already parsed arguments.
pub async fn run_with(args: Args) -> Result<i32> {
    let config = match &args.config {
        Some(path) => Some(load_pack_config(path)?),
        None => discover_pack_config(&std::env::current_dir()?)?,
    };
    let args = match config {
        Some(config) => args.merge(config),
        None => args,
    };
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let options = build_options(&args)?;

    let index = Arc::new(LocalReleaseIndex::new(options.release_dir()));
    let mut packager = Packager::for_current_os(index).with_progress(|stage, percent| {
        log::debug!("{}: {}%", stage, percent);
    });
    if let Some(template) = &args.sign_template {
        packager = packager.with_signer(Arc::new(CommandSigner::from_template(template)?));
    }

    let output = packager.run(options).await?;
    print_summary(&output);
    Ok(0)
}

fn build_options(args: &Args) -> Result<PackOptions> {
    let missing = |argument: &str| CliError::MissingArgument {
        argument: argument.to_string(),
    };

    let pack_dir = args.pack_dir.as_ref().ok_or_else(|| missing("--pack-dir"))?;
    let release_dir = args.output_dir();

    let mut builder = PackOptionsBuilder::new()
        .package_id(args.pack_id.clone().ok_or_else(|| missing("--pack-id"))?)
        .version(args.pack_version.clone().ok_or_else(|| missing("--pack-version"))?)
        .package_dir(pack_dir.absolutize()?)
        .release_dir(release_dir.absolutize()?);

    if let Some(runtime) = &args.runtime {
        builder = builder.runtime(runtime);
    }
    if let Some(channel) = &args.channel {
        builder = builder.channel(channel);
    }
    if let Some(delta) = &args.delta {
        builder = builder.delta_mode(delta.parse::<DeltaMode>()?);
    }
    if let Some(title) = &args.pack_title {
        builder = builder.title(title);
    }
    if let Some(authors) = &args.pack_authors {
        builder = builder.authors(authors);
    }
    if let Some(description) = &args.description {
        builder = builder.description(description);
    }
    if let Some(main_exe) = &args.main_exe {
        builder = builder.main_exe(main_exe);
    }
    if let Some(notes) = &args.release_notes {
        builder = builder.release_notes(notes);
    }
    if let Some(splash) = &args.splash_image {
        builder = builder.splash_image(splash);
    }
    if let Some(icon) = &args.icon {
        builder = builder.icon(icon);
    }

    Ok(builder.build()?)
}

fn print_summary(output: &PackOutput) {
    println!(
        "✓ Packaged {} {} (channel: {})",
        output.full_release.package_id, output.version, output.channel
    );
    println!("  Full:     {}", output.full_release.file_name);
    if let Some(delta) = &output.delta_release {
        println!("  Delta:    {}", delta.file_name);
    }
    if let Some(portable) = &output.portable {
        println!("  Portable: {}", portable.display());
    }
    if let Some(setup) = &output.setup {
        println!("  Setup:    {}", setup.display());
    }
}
