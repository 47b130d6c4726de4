//! `bob` build flags and the run that ties config, runner and pipeline together.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use bob_build::{
    pipeline::{self, BuildScope},
    BuildContext, DispatchSummary,
};
use bob_core::{
    config::{self, GpgDecrypt},
    process::{DryRunRunner, SystemRunner},
    KindFilter, Runner, Tools,
};
use bob_detector::HttpManifestSource;

/// Flags accepted by `bob`.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Project directory to build (defaults to the nearest enclosing project).
    pub dir: Option<PathBuf>,

    /// Push image tags and publish bundles after building.
    #[arg(long)]
    pub push: bool,

    /// Only run targets of this kind (`docker-public`, `docker-private`,
    /// `docker-local`, `bundle`, `oci`) or `all`.
    #[arg(long, default_value = "all")]
    pub kind: KindFilter,

    /// Build every project under the repository root.
    #[arg(long, conflicts_with_all = ["changed", "dir"])]
    pub all: bool,

    /// Build projects whose last commit is newer than their published artifact.
    #[arg(long, conflicts_with = "dir")]
    pub changed: bool,

    /// Log container and publisher commands instead of running them.
    #[arg(long)]
    pub dry_run: bool,
}

impl BuildArgs {
    pub fn run(self) -> Result<()> {
        let cwd = std::env::current_dir().context("could not determine working directory")?;
        let start = self
            .dir
            .as_ref()
            .map_or_else(|| cwd.clone(), |dir| cwd.join(dir));

        // Tool overrides live in the config itself, so decryption uses the default.
        let decrypt = GpgDecrypt::new(&SystemRunner, Tools::default().gpg);
        let config = config::load_config(&start, &decrypt).context("failed to load bob config")?;

        let runner: Box<dyn Runner> = if self.dry_run {
            Box::new(DryRunRunner::for_tools(SystemRunner, &config.tools))
        } else {
            Box::new(SystemRunner)
        };
        let ctx = BuildContext::new(&config, runner.as_ref()).with_dry_run(self.dry_run);
        debug!("scratch root {}", config.scratch_root().display());
        let manifests = HttpManifestSource::new(config.artifactor_url_prefix.clone());

        let scope = if self.all {
            BuildScope::All
        } else if self.changed {
            BuildScope::Changed
        } else if let Some(dir) = self.dir.clone() {
            BuildScope::Dir(dir)
        } else {
            BuildScope::Nearest(cwd)
        };

        let summaries = pipeline::run(&ctx, &scope, &self.kind, self.push, &manifests)
            .with_context(|| format!("build failed ({})", describe(&scope)))?;

        if summaries.is_empty() {
            println!("No projects to build.");
        }
        for summary in &summaries {
            print_summary(summary, self.dry_run);
        }
        Ok(())
    }
}

fn describe(scope: &BuildScope) -> String {
    match scope {
        BuildScope::Dir(dir) | BuildScope::Nearest(dir) => dir.display().to_string(),
        BuildScope::All => "--all".to_string(),
        BuildScope::Changed => "--changed".to_string(),
    }
}

fn print_summary(summary: &DispatchSummary, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let ran: Vec<&str> = summary.ran.iter().map(|k| k.as_str()).collect();
    println!(
        "{prefix}✓ '{}' at {} ({})",
        summary.project.name,
        summary.project.revision.short,
        if ran.is_empty() {
            "nothing to build".to_string()
        } else {
            ran.join(", ")
        }
    );
    if !summary.skipped.is_empty() {
        println!("  skipped {} target(s)", summary.skipped.len());
    }
}
