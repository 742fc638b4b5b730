//! Execution Adapters
//!
//! One adapter per executor kind turns a skill's entry point and a JSON
//! payload into a concrete child-process invocation. All adapters funnel
//! into the shared `run_command` helper, which owns environment merging,
//! log capture, and the hard wall-clock timeout.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::registry::RegistryError;
use crate::types::{ExecutorKind, ExecutorSpec, RunStatus};

/// Environment variable carrying the serialized input payload to the child
pub const PAYLOAD_ENV_VAR: &str = "SKILL_INPUT";

/// Failures that prevent a run from being attempted. A skill that *ran*
/// and failed (timeout included) is an `ExecutionResult`, never an error.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Unknown skill: {0}")]
    UnknownSkill(String),
    #[error("Executor kind '{0}' cannot be run")]
    UnsupportedExecutor(String),
    #[error("Could not prepare working copy: {0}")]
    Workspace(String),
    #[error("Failed to spawn process: {0}")]
    Spawn(String),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything one execution needs: identity, isolation, limits
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: String,
    pub skill_id: String,
    /// Per-run isolated copy of the install directory
    pub working_dir: PathBuf,
    pub log_path: PathBuf,
    pub timeout: Duration,
    /// Overrides merged over the host environment
    pub environment: HashMap<String, String>,
}

/// Normalized outcome of one child-process execution
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub run_id: String,
    pub skill_id: String,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub timed_out: bool,
}

/// Closed set of runnable executor kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adapter {
    Python,
    Node,
    Command,
}

/// Select the adapter for a kind; non-runnable kinds fail here, before any
/// process is spawned
pub fn adapter_for(kind: ExecutorKind) -> Result<Adapter, RunError> {
    match kind {
        ExecutorKind::Python => Ok(Adapter::Python),
        ExecutorKind::Node => Ok(Adapter::Node),
        ExecutorKind::Command => Ok(Adapter::Command),
        ExecutorKind::Manual => Err(RunError::UnsupportedExecutor(kind.as_str().to_string())),
    }
}

impl Adapter {
    /// Concrete argument vector for the child process
    pub fn build_argv(&self, spec: &ExecutorSpec) -> Vec<String> {
        let entry: Vec<String> = spec
            .entry_point
            .split_whitespace()
            .map(str::to_string)
            .collect();

        match self {
            Self::Python => {
                let interpreter = spec.runtime_hint.clone().unwrap_or_else(|| "python3".to_string());
                std::iter::once(interpreter).chain(entry).collect()
            }
            Self::Node => {
                let interpreter = spec.runtime_hint.clone().unwrap_or_else(|| "node".to_string());
                std::iter::once(interpreter).chain(entry).collect()
            }
            // The entry point already names the executable
            Self::Command => entry,
        }
    }
}

/// Spawn the child, pinned to the context's working directory, with the
/// payload in `SKILL_INPUT`. Stdout/stderr are captured into the per-run
/// log file (command line recorded first). The context's timeout is a hard
/// wall-clock deadline: on expiry the child is killed and the run comes
/// back as a failed result.
pub async fn run_command(
    argv: &[String],
    ctx: &ExecutionContext,
    payload: &serde_json::Value,
) -> Result<ExecutionResult, RunError> {
    if argv.is_empty() {
        return Err(RunError::Spawn("empty argument vector".to_string()));
    }

    if let Some(parent) = ctx.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&ctx.log_path)?;
    writeln!(log, "$ {}", argv.join(" "))?;

    let payload_json = payload.to_string();
    let started_at = Utc::now();
    let clock = Instant::now();

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..])
        .current_dir(&ctx.working_dir)
        .envs(&ctx.environment)
        .env(PAYLOAD_ENV_VAR, &payload_json)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("[{}] exec: {}", ctx.run_id, argv.join(" "));
    let child = cmd
        .spawn()
        .map_err(|e| RunError::Spawn(format!("{}: {}", argv[0], e)))?;

    match tokio::time::timeout(ctx.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();

            writeln!(log, "--- stdout ---")?;
            log.write_all(output.stdout.as_slice())?;
            writeln!(log, "--- stderr ---")?;
            log.write_all(output.stderr.as_slice())?;

            let status = if output.status.success() {
                RunStatus::Success
            } else {
                RunStatus::Failed
            };

            Ok(ExecutionResult {
                run_id: ctx.run_id.clone(),
                skill_id: ctx.skill_id.clone(),
                status,
                exit_code: output.status.code(),
                stdout,
                stderr,
                log_path: ctx.log_path.clone(),
                started_at,
                finished_at: Utc::now(),
                duration_ms: clock.elapsed().as_millis() as u64,
                timed_out: false,
            })
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => {
            // Deadline expired: dropping the wait future kills the child
            // (kill_on_drop), so nothing is left hanging.
            warn!(
                "[{}] skill {} timed out after {}s",
                ctx.run_id,
                ctx.skill_id,
                ctx.timeout.as_secs()
            );
            writeln!(
                log,
                "!!! timeout after {}s; process killed",
                ctx.timeout.as_secs()
            )?;

            Ok(ExecutionResult {
                run_id: ctx.run_id.clone(),
                skill_id: ctx.skill_id.clone(),
                status: RunStatus::Failed,
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                log_path: ctx.log_path.clone(),
                started_at,
                finished_at: Utc::now(),
                duration_ms: clock.elapsed().as_millis() as u64,
                timed_out: true,
            })
        }
    }
}
