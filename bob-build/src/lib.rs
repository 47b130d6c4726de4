//! # bob-build
//!
//! Build directory isolation, tag/label derivation, per-kind executors and
//! the concurrent per-project dispatcher.
//!
//! Call [`dispatch`] to build a single project directory, or
//! [`pipeline::run`] to select and build projects for a [`pipeline::BuildScope`].

pub mod dispatch;
pub mod error;
pub mod executor;
pub mod isolate;
pub mod pipeline;
pub mod tags;

pub use dispatch::{dispatch, BuildContext, DispatchSummary};
pub use error::BuildError;
pub use tags::{derive_labels, derive_tags, TagSet};
