//! Source-control revision lookups for a project directory.

use std::path::Path;

use crate::error::RevisionError;
use crate::process::{run_text, Invocation, Runner};
use crate::types::Revision;

/// Asks the source-control tool about a directory via `-C <dir>`.
pub struct RevisionResolver<'a> {
    runner: &'a dyn Runner,
    git: String,
}

impl<'a> RevisionResolver<'a> {
    pub fn new(runner: &'a dyn Runner, git: impl Into<String>) -> Self {
        Self {
            runner,
            git: git.into(),
        }
    }

    /// Full revision of `HEAD`.
    pub fn full(&self, dir: &Path) -> Result<String, RevisionError> {
        self.query(dir, &["rev-parse", "HEAD"])
    }

    /// Abbreviated revision of `HEAD`.
    pub fn short(&self, dir: &Path) -> Result<String, RevisionError> {
        self.query(dir, &["rev-parse", "--short", "HEAD"])
    }

    pub fn resolve(&self, dir: &Path) -> Result<Revision, RevisionError> {
        Ok(Revision {
            short: self.short(dir)?,
            full: self.full(dir)?,
        })
    }

    /// Committer timestamp (Unix seconds) of the most recent commit.
    pub fn last_commit_timestamp(&self, dir: &Path) -> Result<i64, RevisionError> {
        let output = self.query(dir, &["log", "-1", "--format=%ct", "HEAD"])?;
        output
            .parse::<i64>()
            .map_err(|_| RevisionError::BadTimestamp {
                dir: dir.to_path_buf(),
                output,
            })
    }

    fn query(&self, dir: &Path, args: &[&str]) -> Result<String, RevisionError> {
        let mut full_args = vec!["-C".to_string(), dir.display().to_string()];
        full_args.extend(args.iter().map(|a| a.to_string()));
        let invocation = Invocation::new(self.git.as_str(), full_args);
        run_text(self.runner, &invocation).map_err(|source| RevisionError::Command {
            dir: dir.to_path_buf(),
            source,
        })
    }
}
