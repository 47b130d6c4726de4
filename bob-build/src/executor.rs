//! Per-target executors.
//!
//! Every [`BuildKind`] maps to exactly one arm of [`execute`]. All container
//! and publisher invocations run inside the project's isolated build
//! directory; nothing here depends on the process working directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use bob_core::{BuildKind, BuildTargetSpec, Invocation, ProjectDescriptor};

use crate::dispatch::{fan_out, BuildContext};
use crate::error::{io_err, BuildError};
use crate::isolate::set_dir_mode;
use crate::tags::{builder_tag, derive_labels, derive_tags};

/// Script a bundle project provides to produce its artifacts.
pub const BUNDLE_SCRIPT: &str = "build";

/// Run one build target of `project` in `build_dir`.
///
/// `slot` is the target's position among the project's targets of the same
/// kind; bundles use it to keep their output directories apart.
pub fn execute(
    ctx: &BuildContext<'_>,
    project: &ProjectDescriptor,
    target: &BuildTargetSpec,
    slot: usize,
    build_dir: &Path,
) -> Result<(), BuildError> {
    match &target.kind {
        BuildKind::PublicImage | BuildKind::PrivateImage | BuildKind::LocalImage => {
            build_image(ctx, project, target, build_dir)
        }
        BuildKind::Bundle => build_bundle(ctx, project, target, slot, build_dir),
        BuildKind::Oci => Err(BuildError::OciNotSupported),
        BuildKind::Unknown(kind) => Err(BuildError::InvalidKind(kind.clone())),
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

fn build_image(
    ctx: &BuildContext<'_>,
    project: &ProjectDescriptor,
    target: &BuildTargetSpec,
    build_dir: &Path,
) -> Result<(), BuildError> {
    let Some(tags) = derive_tags(
        &target.kind,
        &project.name,
        &project.revision.short,
        target.latest,
        ctx.config,
    ) else {
        return Err(BuildError::InvalidKind(target.kind.to_string()));
    };
    let labels = derive_labels(&target.labels, &project.revision, Utc::now().timestamp());

    let mut args = vec![
        "build".to_string(),
        "-f".to_string(),
        target.dockerfile.display().to_string(),
    ];
    for tag in tags.all() {
        args.push("-t".to_string());
        args.push(tag.to_string());
    }
    for label in labels {
        args.push("--label".to_string());
        args.push(label);
    }
    args.push(".".to_string());

    ctx.runner
        .run(&Invocation::new(ctx.container(), args).in_dir(build_dir))?;
    info!("{}: built {} image", project.name, target.kind);

    if !project.push || tags.registry.is_empty() {
        return Ok(());
    }
    push_tags(ctx, &tags.registry, build_dir)
}

/// Push every tag concurrently; the first failure wins.
fn push_tags(ctx: &BuildContext<'_>, tags: &[String], build_dir: &Path) -> Result<(), BuildError> {
    fan_out(tags, |tag| {
        ctx.runner.run(
            &Invocation::new(ctx.container(), ["push", tag.as_str()]).in_dir(build_dir),
        )?;
        info!("pushed {tag}");
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------------

/// Host directory mounted at `/output` while the bundle script runs.
///
/// The first bundle of a project writes to `<name>--<rev>`; later ones get a
/// `--<slot>` suffix so concurrent bundles never share a directory.
pub fn bundle_output_dir(
    ctx: &BuildContext<'_>,
    project: &ProjectDescriptor,
    slot: usize,
) -> PathBuf {
    let mut name = format!("{}--{}", project.name.path_safe(), project.revision.short);
    if slot > 0 {
        name.push_str(&format!("--{slot}"));
    }
    ctx.config.scratch_root().join(name)
}

fn build_bundle(
    ctx: &BuildContext<'_>,
    project: &ProjectDescriptor,
    target: &BuildTargetSpec,
    slot: usize,
    build_dir: &Path,
) -> Result<(), BuildError> {
    let output_dir = bundle_output_dir(ctx, project, slot);
    if ctx.dry_run {
        info!("[dry-run] recreate {}", output_dir.display());
    } else {
        recreate_dir(&output_dir)?;
    }

    let tag = builder_tag(&project.name, &project.revision.short, slot);
    ctx.runner.run(
        &Invocation::new(
            ctx.container(),
            [
                "build".to_string(),
                "-f".to_string(),
                target.dockerfile.display().to_string(),
                "-t".to_string(),
                tag.clone(),
                ".".to_string(),
            ],
        )
        .in_dir(build_dir),
    )?;

    // The script is looked up in the original tree, not the isolated copy.
    if project.source_dir.join(BUNDLE_SCRIPT).exists() {
        ctx.runner.run(
            &Invocation::new(
                ctx.container(),
                [
                    "run".to_string(),
                    "-v".to_string(),
                    format!("{}:/output", output_dir.display()),
                    "-t".to_string(),
                    tag,
                    format!("/{BUNDLE_SCRIPT}"),
                ],
            )
            .in_dir(build_dir),
        )?;
        info!("{}: bundle written to {}", project.name, output_dir.display());
    }

    if !project.push {
        return Ok(());
    }

    ctx.runner.run(
        &Invocation::new(
            ctx.config.tools.artifactor.as_str(),
            [
                "-dir".to_string(),
                output_dir.display().to_string(),
                "-version".to_string(),
                project.revision.short.clone(),
                "-latest=true".to_string(),
                "-project".to_string(),
                project.name.0.clone(),
                "-gcs-prefix".to_string(),
                ctx.config.artifactor_gcs_prefix.clone(),
                "-url-prefix".to_string(),
                ctx.config.artifactor_url_prefix.clone(),
            ],
        )
        .in_dir(build_dir),
    )?;
    info!("{}: published bundle {}", project.name, project.revision.short);
    Ok(())
}

fn recreate_dir(dir: &Path) -> Result<(), BuildError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    fs::create_dir(dir).map_err(|e| io_err(dir, e))?;
    set_dir_mode(dir)
}
