//! Symlink-free build directories.
//!
//! Container tools refuse (or silently mishandle) symlinks that point outside
//! the build context. Before building, a project's source tree is copied into
//! a scratch directory with every link replaced by the file or directory it
//! points to.
//!
//! Scratch layout:
//!
//! ```text
//! <scratch_root>/bob--<name>--<short_rev>--<unix_seconds>/
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use bob_core::{ProjectDescriptor, ProjectName};

use crate::error::{io_err, BuildError};

/// `bob--<name>--<short_rev>--<unix_seconds>`, with `/` in the name made path safe.
pub fn build_dir_name(name: &ProjectName, short_rev: &str, unix_seconds: i64) -> String {
    format!("bob--{}--{short_rev}--{unix_seconds}", name.path_safe())
}

/// Where a build directory for `project` created now would live.
pub fn planned_build_dir(project: &ProjectDescriptor, scratch_root: &Path) -> PathBuf {
    scratch_root.join(build_dir_name(
        &project.name,
        &project.revision.short,
        Utc::now().timestamp(),
    ))
}

/// Create a fresh build directory under `scratch_root` and fill it with a
/// symlink-free copy of the project's source tree.
///
/// On any copy failure the half-written directory is removed and the error
/// returned; callers must not build.
pub fn create_build_dir(
    project: &ProjectDescriptor,
    scratch_root: &Path,
) -> Result<PathBuf, BuildError> {
    let dir = planned_build_dir(project, scratch_root);

    fs::create_dir(&dir).map_err(|e| io_err(&dir, e))?;
    set_dir_mode(&dir)?;

    if let Err(err) = copy_dir(&project.source_dir, &dir) {
        let _ = fs::remove_dir_all(&dir);
        return Err(err);
    }

    info!(
        "isolated {} into {}",
        project.source_dir.display(),
        dir.display()
    );
    Ok(dir)
}

/// Recursively copy the contents of `src` into the existing directory `dst`,
/// resolving every symlink to its target first.
///
/// Directory and file permission bits are carried over. A broken link or any
/// unreadable entry aborts the copy.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<(), BuildError> {
    let entries = fs::read_dir(src).map_err(|e| io_err(src, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| io_err(src, e))?;
        let link_path = entry.path();
        let target = fs::canonicalize(&link_path).map_err(|e| io_err(&link_path, e))?;
        let meta = fs::metadata(&target).map_err(|e| io_err(&target, e))?;
        let dst_path = dst.join(entry.file_name());

        if meta.is_dir() {
            fs::create_dir(&dst_path).map_err(|e| io_err(&dst_path, e))?;
            copy_dir(&target, &dst_path)?;
            // Applied last so read-only directories can still be filled.
            fs::set_permissions(&dst_path, meta.permissions())
                .map_err(|e| io_err(&dst_path, e))?;
        } else {
            fs::copy(&target, &dst_path).map_err(|e| io_err(&dst_path, e))?;
        }

        if target != link_path {
            debug!("resolved {} -> {}", link_path.display(), target.display());
        }
    }

    Ok(())
}

#[cfg(unix)]
pub(crate) fn set_dir_mode(path: &Path) -> Result<(), BuildError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
pub(crate) fn set_dir_mode(_path: &Path) -> Result<(), BuildError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
