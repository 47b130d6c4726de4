//! Error types for bob-core.

use std::path::PathBuf;

use thiserror::Error;

/// Failures running an external program.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started at all (missing binary, bad cwd).
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the child's stdout or waiting on it failed.
    #[error("I/O error while running `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("`{command}` exited with {}", exit_label(.code))]
    Failed { command: String, code: Option<i32> },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Failures querying the source-control tool for a project directory.
#[derive(Debug, Error)]
pub enum RevisionError {
    #[error("revision lookup failed for {dir}: {source}")]
    Command {
        dir: PathBuf,
        #[source]
        source: ProcessError,
    },

    /// The commit-log query returned something that is not a Unix timestamp.
    #[error("unexpected commit timestamp {output:?} for {dir}")]
    BadTimestamp { dir: PathBuf, output: String },
}

/// All errors that can arise while loading orchestrator or project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, including file path and line context from serde_yaml.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No orchestrator config (or descriptor) was found walking upward.
    #[error("no {names} found in {start} or any parent directory")]
    NotFound { start: PathBuf, names: String },

    /// The encrypted config could not be decrypted.
    #[error("failed to decrypt {path}: {source}")]
    Decrypt {
        path: PathBuf,
        #[source]
        source: ProcessError,
    },

    #[error(transparent)]
    Revision(#[from] RevisionError),
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
