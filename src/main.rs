//! Kodegen Bundler Pack - Release packager for self-updating applications.
//!
//! This binary packages an application directory into full, delta, portable
//! and setup artifacts and publishes them to a release directory.

use std::process;

use kodegen_bundler_pack::cli;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    process::exit(exit_code);
}
