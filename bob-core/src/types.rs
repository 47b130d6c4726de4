//! Domain types for bob.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! The on-disk shapes (`bob.yml`, `build.yml`) are serde + serde_yaml types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A project's unique name, as declared in its `build.yml`.
///
/// Used verbatim in image tags and artifact paths; may contain `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectName(pub String);

impl ProjectName {
    /// The name with `/` replaced by `--`, safe to use as a single path component.
    pub fn path_safe(&self) -> String {
        self.0.replace('/', "--")
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Build kinds
// ---------------------------------------------------------------------------

/// The closed set of build target kinds.
///
/// Any kind string outside the known set parses to [`BuildKind::Unknown`] so
/// that the descriptor still loads and the failure surfaces when that target
/// is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildKind {
    /// Image pushed to the public registry.
    PublicImage,
    /// Image pushed to the private registry.
    PrivateImage,
    /// Image that only ever lives in the local container daemon.
    LocalImage,
    /// Output files produced by running `/build` inside a builder image.
    Bundle,
    /// Reserved; always fails with "not supported".
    Oci,
    Unknown(String),
}

impl BuildKind {
    pub fn as_str(&self) -> &str {
        match self {
            BuildKind::PublicImage => "docker-public",
            BuildKind::PrivateImage => "docker-private",
            BuildKind::LocalImage => "docker-local",
            BuildKind::Bundle => "bundle",
            BuildKind::Oci => "oci",
            BuildKind::Unknown(kind) => kind,
        }
    }
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for BuildKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "docker-public" => BuildKind::PublicImage,
            "docker-private" => BuildKind::PrivateImage,
            "docker-local" => BuildKind::LocalImage,
            "bundle" => BuildKind::Bundle,
            "oci" => BuildKind::Oci,
            _ => BuildKind::Unknown(s),
        }
    }
}

impl From<&str> for BuildKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

impl From<BuildKind> for String {
    fn from(kind: BuildKind) -> Self {
        kind.as_str().to_owned()
    }
}

/// Which targets of a project a dispatch should run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    All,
    Only(BuildKind),
}

impl KindFilter {
    pub fn matches(&self, kind: &BuildKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Only(wanted) => wanted == kind,
        }
    }
}

impl FromStr for KindFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "all" => KindFilter::All,
            other => KindFilter::Only(BuildKind::from(other)),
        })
    }
}

impl fmt::Display for KindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindFilter::All => f.write_str("all"),
            KindFilter::Only(kind) => kind.fmt(f),
        }
    }
}

// ---------------------------------------------------------------------------
// build.yml
// ---------------------------------------------------------------------------

fn default_dockerfile() -> PathBuf {
    PathBuf::from("Dockerfile")
}

/// One declared build target inside a project's `build.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTargetSpec {
    pub kind: BuildKind,
    /// Also produce the floating `:latest` registry tag.
    #[serde(default)]
    pub latest: bool,
    /// Label key → value template (see the tag/label deriver for placeholders).
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Relative to the project directory.
    #[serde(default = "default_dockerfile")]
    pub dockerfile: PathBuf,
    /// Reserved, not interpreted.
    #[serde(default)]
    pub versions: Vec<String>,
}

/// The raw contents of a `build.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorFile {
    pub name: ProjectName,
    #[serde(default)]
    pub builds: Vec<BuildTargetSpec>,
}

/// Full and abbreviated source-control revision of a project directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Revision {
    pub full: String,
    pub short: String,
}

/// A loaded project, ready to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub name: ProjectName,
    /// Absolute path of the project directory (the one holding `build.yml`).
    pub source_dir: PathBuf,
    pub targets: Vec<BuildTargetSpec>,
    pub push: bool,
    /// Always resolved against `source_dir`, never the build directory.
    pub revision: Revision,
    /// Symlink-free copy of `source_dir`; `None` until isolation has run.
    pub build_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// bob.yml
// ---------------------------------------------------------------------------

/// Program names for the external tools bob drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tools {
    pub container: String,
    pub git: String,
    pub artifactor: String,
    pub gpg: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            container: "docker".to_string(),
            git: "git".to_string(),
            artifactor: "artifactor".to_string(),
            gpg: "gpg".to_string(),
        }
    }
}

/// Process-wide orchestrator configuration, loaded once from `bob.yml`.
///
/// Registry authentication is expected to be established (`docker login`)
/// before bob runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub private_registry: String,
    #[serde(default)]
    pub public_registry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp_credentials_filepath: Option<PathBuf>,
    #[serde(default)]
    pub artifactor_gcs_prefix: String,
    #[serde(default)]
    pub artifactor_url_prefix: String,
    /// Root for build directories and bundle outputs; the system temp dir when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    #[serde(default)]
    pub tools: Tools,

    /// Directory holding the config file; project discovery starts here.
    #[serde(skip)]
    pub base_dir: PathBuf,
    #[serde(skip)]
    pub path: PathBuf,
}

impl OrchestratorConfig {
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_roundtrip() {
        for kind in [
            BuildKind::PublicImage,
            BuildKind::PrivateImage,
            BuildKind::LocalImage,
            BuildKind::Bundle,
            BuildKind::Oci,
        ] {
            assert_eq!(BuildKind::from(kind.to_string()), kind);
        }
    }

    #[test]
    fn unknown_kind_keeps_its_string() {
        let kind = BuildKind::from("docker-secret");
        assert_eq!(kind, BuildKind::Unknown("docker-secret".to_string()));
        assert_eq!(kind.to_string(), "docker-secret");
    }

    #[test]
    fn kind_filter_parses_all() {
        let all: KindFilter = "all".parse().unwrap();
        assert_eq!(all, KindFilter::All);
        assert!(all.matches(&BuildKind::Bundle));

        let only: KindFilter = "bundle".parse().unwrap();
        assert!(only.matches(&BuildKind::Bundle));
        assert!(!only.matches(&BuildKind::LocalImage));
    }

    #[test]
    fn path_safe_name_replaces_slashes() {
        assert_eq!(ProjectName::from("team/api").path_safe(), "team--api");
        assert_eq!(ProjectName::from("api").path_safe(), "api");
    }

    #[test]
    fn target_defaults_apply() {
        let spec: BuildTargetSpec = serde_yaml::from_str("kind: docker-local\n").expect("parse");
        assert_eq!(spec.kind, BuildKind::LocalImage);
        assert!(!spec.latest);
        assert!(spec.labels.is_empty());
        assert_eq!(spec.dockerfile, PathBuf::from("Dockerfile"));
    }

    #[test]
    fn tools_default_to_standard_programs() {
        let cfg: OrchestratorConfig =
            serde_yaml::from_str("public_registry: reg.example.com\n").expect("parse");
        assert_eq!(cfg.tools.container, "docker");
        assert_eq!(cfg.tools.git, "git");
        assert_eq!(cfg.public_registry, "reg.example.com");
    }
}
