//! Error types for bob-build.

use std::path::PathBuf;

use thiserror::Error;

use bob_core::{ConfigError, ProcessError};
use bob_detector::{ChangeError, DiscoveryError};

/// All errors that can arise while building a project.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Missing or malformed `build.yml`/`bob.yml`, or a revision lookup failure.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An external tool (container, publisher) failed.
    #[error("build step failed: {0}")]
    Process(#[from] ProcessError),

    /// Filesystem failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `oci` is a reserved kind with no executor yet.
    #[error("OCI builds are not supported yet")]
    OciNotSupported,

    #[error("invalid build kind {0:?}")]
    InvalidKind(String),

    #[error("project discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("change detection failed: {0}")]
    Changes(#[from] ChangeError),
}

/// Convenience constructor for [`BuildError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.into(),
        source,
    }
}
