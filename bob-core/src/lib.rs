//! bob core library: domain types, configuration loading, external processes.
//!
//! - [`types`]: project, build target and orchestrator config types
//! - [`error`]: [`ConfigError`], [`ProcessError`], [`RevisionError`]
//! - [`config`]: `bob.yml` / `build.yml` lookup and parsing
//! - [`process`]: the [`Runner`] seam every external tool call goes through
//! - [`revision`]: source-control revision queries

pub mod config;
pub mod error;
pub mod process;
pub mod revision;
pub mod types;

pub use error::{ConfigError, ProcessError, RevisionError};
pub use process::{Invocation, Runner};
pub use revision::RevisionResolver;
pub use types::{
    BuildKind, BuildTargetSpec, DescriptorFile, KindFilter, OrchestratorConfig,
    ProjectDescriptor, ProjectName, Revision, Tools,
};
