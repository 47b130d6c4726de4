use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use bob_core::config::DESCRIPTOR_FILE;
use tracing::debug;

use crate::DiscoveryError;

/// Return the absolute paths of all directories under `base` that directly
/// contain a `build.yml`.
///
/// A directory holding a descriptor is recorded and not searched further, so
/// no returned path is nested inside another. Symlinked directories are
/// followed; each real directory is visited once, through the first path
/// that reaches it. Files and dangling links are ignored. The result is sorted.
pub fn find_project_dirs(base: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let base = if base.is_absolute() {
        base.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| DiscoveryError::Io {
                path: base.to_path_buf(),
                source,
            })?
            .join(base)
    };

    let mut seen = HashSet::from([canonical(&base)?]);
    let mut found = Vec::new();
    let mut pending = vec![base];

    while let Some(dir) = pending.pop() {
        for child in child_dirs(&dir)? {
            if !seen.insert(canonical(&child)?) {
                debug!("already visited {}", child.display());
                continue;
            }

            let descriptor = child.join(DESCRIPTOR_FILE);
            let has_descriptor = descriptor
                .try_exists()
                .map_err(|source| DiscoveryError::Io {
                    path: descriptor.clone(),
                    source,
                })?;

            if has_descriptor {
                debug!("found project {}", child.display());
                found.push(child);
            } else {
                pending.push(child);
            }
        }
    }

    found.sort();
    Ok(found)
}

fn canonical(path: &Path) -> Result<PathBuf, DiscoveryError> {
    fs::canonicalize(path).map_err(|source| DiscoveryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Directories (or links to directories) directly inside `dir`, sorted.
fn child_dirs(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let io = |source| DiscoveryError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut children = Vec::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        let entry = entry.map_err(io)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(io)?;

        let is_dir = if file_type.is_symlink() {
            match fs::metadata(&path) {
                Ok(meta) => meta.is_dir(),
                Err(err) => {
                    debug!("skipping dangling link {}: {err}", path.display());
                    false
                }
            }
        } else {
            file_type.is_dir()
        };

        if is_dir {
            children.push(path);
        }
    }
    children.sort();
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn unreadable_base_aborts() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("nope");
        let err = find_project_dirs(&missing).unwrap_err();
        assert!(err.to_string().contains("nope"), "got: {err}");
    }

    #[test]
    fn base_itself_is_not_a_candidate() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join(DESCRIPTOR_FILE), "name: root\n").expect("write");
        assert!(find_project_dirs(dir.path()).expect("find").is_empty());
    }
}
