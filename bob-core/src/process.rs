//! External program execution.
//!
//! Every call to docker, git, artifactor or gpg goes through a [`Runner`].
//! Each [`Invocation`] carries its own working directory; the process-wide
//! current directory is never changed, so invocations for different projects
//! can safely run side by side.

use std::collections::BTreeSet;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::error::ProcessError;
use crate::types::Tools;

/// One external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the child; inherits the caller's when `None`.
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The first argument, e.g. `build` / `push` / `run` for the container tool.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs external programs and returns their captured stdout.
///
/// Implementations must be shareable across the dispatcher's worker threads.
pub trait Runner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<Vec<u8>, ProcessError>;
}

impl<R: Runner + ?Sized> Runner for &R {
    fn run(&self, invocation: &Invocation) -> Result<Vec<u8>, ProcessError> {
        (**self).run(invocation)
    }
}

/// Runs an invocation and returns stdout as trimmed UTF-8.
pub fn run_text(runner: &dyn Runner, invocation: &Invocation) -> Result<String, ProcessError> {
    let out = runner.run(invocation)?;
    Ok(String::from_utf8_lossy(&out).trim().to_string())
}

// ---------------------------------------------------------------------------
// SystemRunner
// ---------------------------------------------------------------------------

/// Spawns real child processes.
///
/// Stdout is copied to the terminal as it arrives while also being captured;
/// stderr is passed straight through.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<Vec<u8>, ProcessError> {
        info!(cwd = ?invocation.cwd, "running {invocation}");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let io = |source| ProcessError::Io {
            program: invocation.program.clone(),
            source,
        };

        let mut captured = Vec::new();
        if let Some(mut stdout) = child.stdout.take() {
            let mut chunk = [0u8; 8192];
            loop {
                let n = stdout.read(&mut chunk).map_err(io)?;
                if n == 0 {
                    break;
                }
                captured.extend_from_slice(&chunk[..n]);
                // Echo failures only affect the terminal copy, never the capture.
                let _ = std::io::stdout().write_all(&chunk[..n]);
            }
        }

        let status = child.wait().map_err(io)?;
        if !status.success() {
            return Err(ProcessError::Failed {
                command: invocation.to_string(),
                code: status.code(),
            });
        }
        Ok(captured)
    }
}

// ---------------------------------------------------------------------------
// DryRunRunner
// ---------------------------------------------------------------------------

/// Executes only read-only programs (by default the source-control tool) and
/// logs everything else instead of running it.
#[derive(Debug)]
pub struct DryRunRunner<R> {
    inner: R,
    passthrough: BTreeSet<String>,
}

impl<R: Runner> DryRunRunner<R> {
    pub fn new<I, S>(inner: R, passthrough: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner,
            passthrough: passthrough.into_iter().map(Into::into).collect(),
        }
    }
}

impl<R: Runner> DryRunRunner<R> {
    /// Lets only the configured source-control program through.
    pub fn for_tools(inner: R, tools: &Tools) -> Self {
        Self::new(inner, [tools.git.clone()])
    }
}

impl<R: Runner> Runner for DryRunRunner<R> {
    fn run(&self, invocation: &Invocation) -> Result<Vec<u8>, ProcessError> {
        if self.passthrough.contains(&invocation.program) {
            return self.inner.run(invocation);
        }
        info!(cwd = ?invocation.cwd, "[dry-run] {invocation}");
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

/// A [`Runner`] that never spawns anything.
///
/// It records every invocation and answers from a script of rules. A rule
/// matches when its pattern is a substring of the rendered command line
/// (`program arg1 arg2 …`); the first matching rule wins. Unmatched
/// invocations succeed with empty stdout.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<(String, Reply)>,
    calls: Mutex<Vec<Invocation>>,
}

#[derive(Debug, Clone)]
enum Reply {
    Stdout(Vec<u8>),
    Fail(i32),
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer invocations matching `pattern` with `stdout`.
    pub fn respond(mut self, pattern: impl Into<String>, stdout: impl AsRef<[u8]>) -> Self {
        self.rules
            .push((pattern.into(), Reply::Stdout(stdout.as_ref().to_vec())));
        self
    }

    /// Fail invocations matching `pattern` with exit status 1.
    pub fn fail(mut self, pattern: impl Into<String>) -> Self {
        self.rules.push((pattern.into(), Reply::Fail(1)));
        self
    }

    /// Canned answers for the three source-control queries of `dir`.
    pub fn with_git(self, dir: &Path, full: &str, short: &str, commit_ts: i64) -> Self {
        let dir = dir.display();
        self.respond(format!("-C {dir} rev-parse --short HEAD"), short)
            .respond(format!("-C {dir} rev-parse HEAD"), full)
            .respond(format!("-C {dir} log -1"), commit_ts.to_string())
    }

    /// Every invocation seen so far, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Invocations of `program` whose first argument is `subcommand`.
    pub fn calls_to(&self, program: &str, subcommand: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program && c.subcommand() == Some(subcommand))
            .collect()
    }
}

impl Runner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<Vec<u8>, ProcessError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(invocation.clone());

        let line = invocation.to_string();
        let reply = self
            .rules
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone());
        debug!("scripted {line} -> {reply:?}");

        match reply {
            Some(Reply::Stdout(out)) => Ok(out),
            Some(Reply::Fail(code)) => Err(ProcessError::Failed {
                command: line,
                code: Some(code),
            }),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_command_line() {
        let inv = Invocation::new("docker", ["push", "reg/foo:abc"]);
        assert_eq!(inv.to_string(), "docker push reg/foo:abc");
        assert_eq!(inv.subcommand(), Some("push"));
    }

    #[test]
    fn scripted_first_matching_rule_wins() {
        let runner = ScriptedRunner::new()
            .respond("rev-parse --short HEAD", "abc123\n")
            .respond("rev-parse HEAD", "abc123def456\n");

        let short = run_text(&runner, &Invocation::new("git", ["rev-parse", "--short", "HEAD"]))
            .expect("short");
        let full =
            run_text(&runner, &Invocation::new("git", ["rev-parse", "HEAD"])).expect("full");
        assert_eq!(short, "abc123");
        assert_eq!(full, "abc123def456");
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn scripted_failure_reports_command() {
        let runner = ScriptedRunner::new().fail("docker push");
        let err = runner
            .run(&Invocation::new("docker", ["push", "x"]))
            .unwrap_err();
        assert!(err.to_string().contains("docker push x"), "got: {err}");
        assert!(err.to_string().contains("status 1"));
    }

    #[test]
    fn dry_run_only_executes_passthrough_programs() {
        let inner = ScriptedRunner::new().respond("git", "deadbeef");
        let dry = DryRunRunner::new(&inner, ["git"]);

        let out = dry
            .run(&Invocation::new("git", ["rev-parse", "HEAD"]))
            .expect("git");
        assert_eq!(out, b"deadbeef");
        let out = dry
            .run(&Invocation::new("docker", ["build", "."]))
            .expect("docker");
        assert!(out.is_empty());
        assert_eq!(inner.calls().len(), 1, "docker must not reach the inner runner");
    }

    #[test]
    fn dry_run_for_tools_runs_only_source_control() {
        let inner = ScriptedRunner::new();
        let tools = Tools {
            git: "/usr/local/bin/git".to_string(),
            ..Tools::default()
        };
        let dry = DryRunRunner::for_tools(&inner, &tools);

        for program in ["/usr/local/bin/git", "git", "gpg", "docker", "artifactor"] {
            dry.run(&Invocation::new(program, ["status"])).expect("run");
        }
        let reached: Vec<String> = inner.calls().into_iter().map(|c| c.program).collect();
        assert_eq!(reached, vec!["/usr/local/bin/git"]);
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_stdout_in_cwd() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let out = SystemRunner
            .run(&Invocation::new("pwd", Vec::<String>::new()).in_dir(dir.path()))
            .expect("pwd");
        let printed = String::from_utf8_lossy(&out).trim().to_string();
        let expected = dir.path().canonicalize().expect("canonicalize");
        assert_eq!(std::path::PathBuf::from(printed).canonicalize().unwrap(), expected);
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_nonzero_exit() {
        let err = SystemRunner
            .run(&Invocation::new("false", Vec::<String>::new()))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Failed { code: Some(1), .. }), "got: {err}");
    }

    #[test]
    fn system_runner_reports_missing_program() {
        let err = SystemRunner
            .run(&Invocation::new("bob-no-such-program", Vec::<String>::new()))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }), "got: {err}");
    }
}
