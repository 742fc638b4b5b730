//! Skill Runner
//!
//! Orchestrates one execution end-to-end: resolve metadata, materialize an
//! isolated per-run copy of the install directory, build the execution
//! context, dispatch to the adapter, and clean up unconditionally. The
//! install directory itself is never touched by execution, so concurrent
//! runs of the same skill (or a run racing a re-import) cannot corrupt
//! each other.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::executor::{adapter_for, run_command, ExecutionContext, ExecutionResult, RunError};
use crate::fsutil;
use crate::registry::SkillRegistry;
use crate::types::SetupStatus;

/// Runs installed skills as isolated, time-bounded child processes
pub struct SkillRunner {
    config: Config,
    registry: Arc<SkillRegistry>,
}

impl SkillRunner {
    pub fn new(config: Config, registry: Arc<SkillRegistry>) -> Self {
        Self { config, registry }
    }

    /// Execute a skill with the given JSON payload.
    ///
    /// Failures before the child process starts surface as errors; a child
    /// that ran and failed (non-zero exit, timeout) comes back as an
    /// `ExecutionResult` with failed status.
    pub async fn run(
        &self,
        skill_id: &str,
        payload: serde_json::Value,
        user_id: &str,
        conversation_id: Option<&str>,
        timeout_override: Option<Duration>,
    ) -> Result<ExecutionResult, RunError> {
        // Reload so out-of-band registry edits are picked up
        self.registry.load()?;
        let meta = self
            .registry
            .get_skill(skill_id)
            .ok_or_else(|| RunError::UnknownSkill(skill_id.to_string()))?;

        if meta.setup_status != SetupStatus::Ready {
            warn!(
                "Running skill {} with setup status '{}'",
                skill_id,
                meta.setup_status.as_str()
            );
        }

        let adapter = adapter_for(meta.executor.kind)?;

        let install_dir = self.config.resolve_install_path(&meta.install_path);
        if !install_dir.is_dir() {
            return Err(RunError::Workspace(format!(
                "install directory missing: {}",
                install_dir.display()
            )));
        }

        // Isolated working copy, removed on every exit path by the guard
        let workspace = tempfile::Builder::new()
            .prefix("skillhost-run-")
            .tempdir()
            .map_err(|e| RunError::Workspace(e.to_string()))?;
        {
            let src = install_dir.clone();
            let dst = workspace.path().to_path_buf();
            tokio::task::spawn_blocking(move || fsutil::copy_dir_recursive(&src, &dst))
                .await
                .map_err(|e| RunError::Workspace(format!("copy task failed: {}", e)))?
                .map_err(|e| RunError::Workspace(e.to_string()))?;
        }

        let run_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
        let log_path = self
            .config
            .logs_dir
            .join(skill_id)
            .join(format!("{}.{}.log", timestamp, run_id));

        let timeout_secs = match timeout_override {
            Some(t) => t.as_secs(),
            None if meta.executor.timeout_secs > 0 => meta.executor.timeout_secs,
            None => self.config.default_timeout_secs,
        };

        let ctx = ExecutionContext {
            run_id: run_id.clone(),
            skill_id: skill_id.to_string(),
            working_dir: workspace.path().to_path_buf(),
            log_path,
            timeout: Duration::from_secs(timeout_secs),
            environment: meta.executor.environment.clone(),
        };

        info!(
            "[{}] running skill {} for user {} (conversation {})",
            run_id,
            skill_id,
            user_id,
            conversation_id.unwrap_or("-")
        );

        let argv = adapter.build_argv(&meta.executor);
        let result = run_command(&argv, &ctx, &payload).await?;

        debug!(
            "[{}] skill {} finished: {} in {}ms",
            run_id,
            skill_id,
            result.status.as_str(),
            result.duration_ms
        );

        // Best-effort bookkeeping; a registry hiccup must not mask the
        // result the child already produced
        if let Err(e) = self.record_last_run(skill_id, &result) {
            warn!("Could not update last-run fields for {}: {}", skill_id, e);
        }

        Ok(result)
    }

    fn record_last_run(&self, skill_id: &str, result: &ExecutionResult) -> Result<(), RunError> {
        self.registry.load()?;
        let mut meta = self
            .registry
            .get_skill(skill_id)
            .ok_or_else(|| RunError::UnknownSkill(skill_id.to_string()))?;
        meta.last_run_at = Some(result.finished_at);
        meta.last_run_status = Some(result.status);
        self.registry.update_skill(meta)?;
        Ok(())
    }
}
