//! bob: build container images and artifact bundles for the projects of a
//! repository.
//!
//! # Usage
//!
//! ```text
//! bob [--push] [--kind <kind>] [--dry-run]            # nearest project
//! bob [--push] [--kind <kind>] [--dry-run] <dir>      # one project
//! bob [--push] [--kind <kind>] [--dry-run] --all      # every project
//! bob [--push] [--kind <kind>] [--dry-run] --changed  # projects newer than their artifact
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

mod commands;

use anyhow::Result;
use clap::Parser;

use commands::build::BuildArgs;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "bob",
    version,
    about = "Build, tag and publish the projects of a repository",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    build: BuildArgs,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    cli.build.run()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
