//! Orchestrator config and project descriptor loading.
//!
//! # File layout
//!
//! ```text
//! <repo>/
//!   bob.yml | bob.yml.gpg.asc   (orchestrator config, found by walking upward)
//!   services/
//!     api/
//!       build.yml               (project descriptor)
//!       Dockerfile
//! ```
//!
//! Lookups take an explicit start directory instead of consulting or
//! changing the process working directory.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{io_err, ConfigError};
use crate::process::{Invocation, Runner};
use crate::revision::RevisionResolver;
use crate::types::{DescriptorFile, OrchestratorConfig, ProjectDescriptor};

pub const CONFIG_FILE: &str = "bob.yml";
pub const ENCRYPTED_CONFIG_FILE: &str = "bob.yml.gpg.asc";
pub const DESCRIPTOR_FILE: &str = "build.yml";

// ---------------------------------------------------------------------------
// 1. Upward search
// ---------------------------------------------------------------------------

/// Walk from `start` towards the filesystem root and return the first file
/// named one of `names`. Within a directory, earlier names take precedence.
pub fn find_parent_file(start: &Path, names: &[&str]) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        names
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// The nearest directory at or above `start` that holds a `build.yml`.
pub fn find_project_dir(start: &Path) -> Result<PathBuf, ConfigError> {
    find_parent_file(start, &[DESCRIPTOR_FILE])
        .and_then(|file| file.parent().map(Path::to_path_buf))
        .ok_or_else(|| ConfigError::NotFound {
            start: start.to_path_buf(),
            names: DESCRIPTOR_FILE.to_string(),
        })
}

// ---------------------------------------------------------------------------
// 2. Decryption
// ---------------------------------------------------------------------------

/// Turns an encrypted config file into plaintext bytes.
pub trait Decrypt {
    fn decrypt(&self, path: &Path) -> Result<Vec<u8>, ConfigError>;
}

/// Decrypts ASCII-armoured files with `gpg --decrypt`, relying on the
/// caller's agent for keys.
pub struct GpgDecrypt<'a> {
    runner: &'a dyn Runner,
    program: String,
}

impl<'a> GpgDecrypt<'a> {
    pub fn new(runner: &'a dyn Runner, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl Decrypt for GpgDecrypt<'_> {
    fn decrypt(&self, path: &Path) -> Result<Vec<u8>, ConfigError> {
        let invocation = Invocation::new(
            self.program.as_str(),
            [
                "--batch".to_string(),
                "--quiet".to_string(),
                "--decrypt".to_string(),
                path.display().to_string(),
            ],
        );
        self.runner
            .run(&invocation)
            .map_err(|source| ConfigError::Decrypt {
                path: path.to_path_buf(),
                source,
            })
    }
}

// ---------------------------------------------------------------------------
// 3. Orchestrator config
// ---------------------------------------------------------------------------

/// Locate `bob.yml` (or its encrypted variant) at or above `start` and load it.
pub fn load_config(start: &Path, decrypt: &dyn Decrypt) -> Result<OrchestratorConfig, ConfigError> {
    let path = find_parent_file(start, &[CONFIG_FILE, ENCRYPTED_CONFIG_FILE]).ok_or_else(|| {
        ConfigError::NotFound {
            start: start.to_path_buf(),
            names: format!("{CONFIG_FILE} or {ENCRYPTED_CONFIG_FILE}"),
        }
    })?;
    info!("found bob config {}", path.display());
    load_config_file(&path, decrypt)
}

/// Load a specific config file, decrypting it first when it is `*.gpg.asc`.
pub fn load_config_file(
    path: &Path,
    decrypt: &dyn Decrypt,
) -> Result<OrchestratorConfig, ConfigError> {
    let bytes = if path.to_string_lossy().ends_with(".gpg.asc") {
        decrypt.decrypt(path)?
    } else {
        std::fs::read(path).map_err(|e| io_err(path, e))?
    };

    let mut config: OrchestratorConfig =
        serde_yaml::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.path = path.to_path_buf();
    config.base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(config)
}

// ---------------------------------------------------------------------------
// 4. Project descriptors
// ---------------------------------------------------------------------------

/// Parse `<dir>/build.yml` without touching source control.
pub fn read_descriptor(dir: &Path) -> Result<DescriptorFile, ConfigError> {
    let path = dir.join(DESCRIPTOR_FILE);
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

/// Load the project in `dir` and resolve its revisions.
///
/// The build directory is left unset; isolation fills it in later.
pub fn load_project(
    dir: &Path,
    revisions: &RevisionResolver<'_>,
    push: bool,
) -> Result<ProjectDescriptor, ConfigError> {
    let source_dir = absolute(dir)?;
    let file = read_descriptor(&source_dir)?;
    let revision = revisions.resolve(&source_dir)?;

    Ok(ProjectDescriptor {
        name: file.name,
        source_dir,
        targets: file.builds,
        push,
        revision,
        build_dir: None,
    })
}

fn absolute(dir: &Path) -> Result<PathBuf, ConfigError> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| io_err(dir, e))?;
    Ok(cwd.join(dir))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
