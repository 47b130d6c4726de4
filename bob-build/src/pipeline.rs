//! Shared build pipeline entrypoint used by the CLI and integration tests.

use std::path::{Path, PathBuf};

use tracing::info;

use bob_core::{config, KindFilter};
use bob_detector::{find_changed_dirs, find_project_dirs, ManifestSource};

use crate::dispatch::{dispatch, BuildContext, DispatchSummary};
use crate::error::{io_err, BuildError};

/// Which projects a pipeline run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildScope {
    /// Exactly this project directory.
    Dir(PathBuf),
    /// The nearest directory at or above this one holding a `build.yml`.
    Nearest(PathBuf),
    /// Every project under the config's base directory.
    All,
    /// Projects under the base directory that changed since their last artifact.
    Changed,
}

/// Resolve a scope to the project directories to build, in build order.
pub fn select(
    ctx: &BuildContext<'_>,
    scope: &BuildScope,
    manifests: &dyn ManifestSource,
) -> Result<Vec<PathBuf>, BuildError> {
    match scope {
        BuildScope::Dir(dir) => Ok(vec![absolute(dir)?]),
        BuildScope::Nearest(start) => Ok(vec![config::find_project_dir(&absolute(start)?)?]),
        BuildScope::All => Ok(find_project_dirs(ctx.config.base_dir())?),
        BuildScope::Changed => Ok(find_changed_dirs(
            ctx.config.base_dir(),
            &ctx.revisions(),
            manifests,
        )?),
    }
}

/// Build every project in `scope`, one project at a time.
///
/// Stops at the first project that fails.
pub fn run(
    ctx: &BuildContext<'_>,
    scope: &BuildScope,
    filter: &KindFilter,
    push: bool,
    manifests: &dyn ManifestSource,
) -> Result<Vec<DispatchSummary>, BuildError> {
    let dirs = select(ctx, scope, manifests)?;
    let mut summaries = Vec::with_capacity(dirs.len());
    for dir in dirs {
        info!("building {}", dir.display());
        summaries.push(dispatch(ctx, &dir, filter, push)?);
    }
    Ok(summaries)
}

fn absolute(dir: &Path) -> Result<PathBuf, BuildError> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| io_err(dir, e))?;
    Ok(cwd.join(dir))
}
