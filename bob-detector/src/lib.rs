//! Project discovery and change detection for `bob-detector`.
//!
//! [`find_project_dirs`] walks a repository tree and returns every directory
//! holding a `build.yml`, stopping at the first descriptor in each branch.
//! [`find_changed_dirs`] narrows that set to projects whose last commit is
//! not older than their most recently published artifact.

use std::path::PathBuf;

use bob_core::ConfigError;
use thiserror::Error;

mod changes;
mod discovery;
pub mod manifest;

pub use changes::{find_changed_dirs, needs_build};
pub use discovery::find_project_dirs;
pub use manifest::{ArtifactManifest, HttpManifestSource, ManifestSource};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from walking the repository tree. Any of these aborts discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a remote manifest could not be used. Never fatal to a run.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not found at {url} (HTTP {status})")]
    Status { url: String, status: u16 },

    #[error("manifest request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },

    #[error("unreadable manifest at {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort change detection.
#[derive(Debug, Error)]
pub enum ChangeError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
