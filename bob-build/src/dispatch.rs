//! Per-project build dispatch.
//!
//! ```text
//! Loaded → DirectoryIsolated → Dispatching → {Running}* → Aggregated → Done
//! ```
//!
//! Each matching target runs on its own scoped thread. The dispatcher waits
//! for all of them; if any failed, exactly one error is returned (the first
//! drained from the result channel) and the rest are logged.

use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use tracing::{info, warn};

use bob_core::{
    config, BuildKind, KindFilter, OrchestratorConfig, ProjectDescriptor, RevisionResolver,
    Runner,
};

use crate::error::BuildError;
use crate::executor::execute;
use crate::isolate::{create_build_dir, planned_build_dir};

/// Everything a build needs besides the project itself.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub config: &'a OrchestratorConfig,
    pub runner: &'a dyn Runner,
    /// Leave the filesystem untouched; only the runner decides what executes.
    pub dry_run: bool,
}

impl<'a> BuildContext<'a> {
    pub fn new(config: &'a OrchestratorConfig, runner: &'a dyn Runner) -> Self {
        Self {
            config,
            runner,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn container(&self) -> &str {
        &self.config.tools.container
    }

    pub fn revisions(&self) -> RevisionResolver<'a> {
        RevisionResolver::new(self.runner, self.config.tools.git.as_str())
    }
}

/// Outcome of a successful project dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub project: ProjectDescriptor,
    pub ran: Vec<BuildKind>,
    pub skipped: Vec<BuildKind>,
}

/// Load, isolate and build the project in `dir`.
pub fn dispatch(
    ctx: &BuildContext<'_>,
    dir: &Path,
    filter: &KindFilter,
    push: bool,
) -> Result<DispatchSummary, BuildError> {
    let mut project = config::load_project(dir, &ctx.revisions(), push)?;
    info!(
        "{}: loaded {} target(s) at {}",
        project.name,
        project.targets.len(),
        project.revision.short
    );

    let scratch_root = ctx.config.scratch_root();
    let build_dir = if ctx.dry_run {
        let planned = planned_build_dir(&project, &scratch_root);
        info!(
            "[dry-run] isolate {} into {}",
            project.source_dir.display(),
            planned.display()
        );
        planned
    } else {
        create_build_dir(&project, &scratch_root)?
    };
    project.build_dir = Some(build_dir.clone());

    run_targets(ctx, project, &build_dir, filter)
}

/// Run every target of an isolated project that passes `filter`.
///
/// Each target gets a slot: its position among declared targets of the same
/// kind, counted before filtering so it is stable across `--kind` choices.
fn run_targets(
    ctx: &BuildContext<'_>,
    project: ProjectDescriptor,
    build_dir: &Path,
    filter: &KindFilter,
) -> Result<DispatchSummary, BuildError> {
    let mut per_kind: HashMap<&BuildKind, usize> = HashMap::new();
    let (selected, skipped): (Vec<_>, Vec<_>) = project
        .targets
        .iter()
        .map(|target| {
            let next = per_kind.entry(&target.kind).or_default();
            let slot = *next;
            *next += 1;
            (slot, target)
        })
        .partition(|(_, target)| filter.matches(&target.kind));
    for (_, target) in &skipped {
        info!("{}: skipping build {} ...", project.name, target.kind);
    }

    info!("{}: dispatching {} build(s)", project.name, selected.len());
    fan_out(&selected, |(slot, target)| {
        execute(ctx, &project, target, *slot, build_dir)
    })?;
    info!("{}: done", project.name);

    let ran = selected.iter().map(|(_, t)| t.kind.clone()).collect();
    let skipped = skipped.iter().map(|(_, t)| t.kind.clone()).collect();
    Ok(DispatchSummary {
        ran,
        skipped,
        project,
    })
}

/// Run `unit` for every item concurrently and wait for all of them.
///
/// Failures are collected through a channel sized to the number of units;
/// the first one drained is returned and any others are logged and dropped.
pub(crate) fn fan_out<T, F>(items: &[T], unit: F) -> Result<(), BuildError>
where
    T: Sync,
    F: Fn(&T) -> Result<(), BuildError> + Sync,
{
    if items.is_empty() {
        return Ok(());
    }

    let (tx, rx) = mpsc::sync_channel(items.len());
    thread::scope(|scope| {
        for item in items {
            let tx = tx.clone();
            let unit = &unit;
            scope.spawn(move || {
                if let Err(err) = unit(item) {
                    let _ = tx.send(err);
                }
            });
        }
    });
    drop(tx);

    let mut errors = rx.into_iter();
    let first = errors.next();
    for dropped in errors {
        warn!("additional failure: {dropped}");
    }
    first.map_or(Ok(()), Err)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
