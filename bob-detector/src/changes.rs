use std::path::{Path, PathBuf};

use bob_core::{config, RevisionResolver};
use tracing::{info, warn};

use crate::discovery::find_project_dirs;
use crate::manifest::{ArtifactManifest, ManifestSource};
use crate::ChangeError;

/// Decide whether a project must be rebuilt.
///
/// Only a known manifest timestamp strictly newer than a known last-commit
/// timestamp skips the build; any missing information means "build".
pub fn needs_build(manifest: Option<&ArtifactManifest>, last_commit: Option<i64>) -> bool {
    match (manifest, last_commit) {
        (Some(manifest), Some(commit)) => manifest.timestamp <= commit,
        _ => true,
    }
}

/// Discover projects under `base` and keep those that changed since their
/// last published artifact, in discovery order.
///
/// Discovery and descriptor errors abort; manifest and commit-lookup
/// failures only mark the project as changed.
pub fn find_changed_dirs(
    base: &Path,
    revisions: &RevisionResolver<'_>,
    manifests: &dyn ManifestSource,
) -> Result<Vec<PathBuf>, ChangeError> {
    let dirs = find_project_dirs(base)?;
    let mut changed = Vec::with_capacity(dirs.len());

    for dir in dirs {
        let descriptor = config::read_descriptor(&dir)?;

        let manifest = manifests
            .fetch(&descriptor.name)
            .map_err(|err| warn!("{}: {err}", descriptor.name))
            .ok();

        // Without a manifest the answer is already "build"; skip the git query.
        let last_commit = match manifest {
            Some(_) => revisions
                .last_commit_timestamp(&dir)
                .map_err(|err| warn!("{}: {err}", descriptor.name))
                .ok(),
            None => None,
        };

        if needs_build(manifest.as_ref(), last_commit) {
            info!("{} needs a build", descriptor.name);
            changed.push(dir);
        } else {
            info!("{} unchanged since its last artifact", descriptor.name);
        }
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(200), Some(100), false)]
    #[case(Some(100), Some(100), true)]
    #[case(Some(100), Some(200), true)]
    #[case(None, Some(100), true)]
    #[case(Some(200), None, true)]
    #[case(None, None, true)]
    fn needs_build_policy(
        #[case] manifest_ts: Option<i64>,
        #[case] commit_ts: Option<i64>,
        #[case] expected: bool,
    ) {
        let manifest = manifest_ts.map(|timestamp| ArtifactManifest { timestamp });
        assert_eq!(needs_build(manifest.as_ref(), commit_ts), expected);
    }
}
