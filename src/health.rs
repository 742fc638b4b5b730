//! Skill Health and Lifecycle Migration
//!
//! Health checks recompute the content checksum of an installed skill and
//! compare it against the value recorded at import. Drift means the files
//! changed after installation; it is recorded on the metadata for operators
//! to act on, and never gates execution. The migration pass renormalizes
//! lifecycle states after upgrades or hand-edits of the registry.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::fsutil;
use crate::registry::SkillRegistry;
use crate::types::SetupStatus;

/// Outcome of one health check
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub skill_id: String,
    pub healthy: bool,
    pub checksum_drift: bool,
    pub entry_point_ok: bool,
    pub notes: String,
    pub checked_at: DateTime<Utc>,
}

/// Verify an installed skill's on-disk state and stamp the result onto its
/// metadata.
pub async fn health_check(
    config: &Config,
    registry: &SkillRegistry,
    skill_id: &str,
) -> anyhow::Result<HealthReport> {
    registry.load()?;
    let mut meta = registry
        .get_skill(skill_id)
        .ok_or_else(|| anyhow::anyhow!("skill not registered: {}", skill_id))?;

    let install_dir = config.resolve_install_path(&meta.install_path);
    let mut notes = Vec::new();
    let mut checksum_drift = false;
    let mut entry_point_ok = true;

    if !install_dir.is_dir() {
        notes.push(format!("install directory missing: {}", install_dir.display()));
        entry_point_ok = false;
    } else {
        let current = {
            let dir = install_dir.clone();
            tokio::task::spawn_blocking(move || fsutil::checksum_dir(&dir)).await??
        };
        if current != meta.checksum {
            checksum_drift = true;
            notes.push(format!(
                "checksum drift: installed files no longer match import ({}.. != {}..)",
                &current[..12.min(current.len())],
                &meta.checksum[..12.min(meta.checksum.len())]
            ));
        }

        if meta.executor.kind.is_executable() {
            let entry_file = meta.executor.entry_point.split_whitespace().next().unwrap_or("");
            if entry_file.is_empty() || !install_dir.join(entry_file).is_file() {
                entry_point_ok = false;
                notes.push(format!("entry point missing: {}", meta.executor.entry_point));
            }
        }
    }

    let healthy = !checksum_drift && entry_point_ok;
    let notes = if notes.is_empty() {
        "ok".to_string()
    } else {
        notes.join("; ")
    };
    let checked_at = Utc::now();

    if !healthy {
        warn!("Health check failed for {}: {}", skill_id, notes);
    }

    meta.health_checked_at = Some(checked_at);
    meta.health_notes = Some(notes.clone());
    registry.update_skill(meta)?;

    Ok(HealthReport {
        skill_id: skill_id.to_string(),
        healthy,
        checksum_drift,
        entry_point_ok,
        notes,
        checked_at,
    })
}

/// Renormalize every skill's setup status. Non-executable kinds are forced
/// to manual-only no matter what the registry says; ready and disabled
/// states are operator decisions and survive the pass; the remaining
/// executable skills are recomputed the same way the importer decides them.
pub fn migrate_setup_statuses(registry: &SkillRegistry) -> anyhow::Result<usize> {
    registry.load()?;
    let mut changed = 0;

    for mut meta in registry.list_skills() {
        let desired = if !meta.executor.kind.is_executable() {
            SetupStatus::ManualOnly
        } else {
            match meta.setup_status {
                SetupStatus::Ready | SetupStatus::Disabled => meta.setup_status,
                _ if !meta.executor.environment.is_empty() => SetupStatus::NeedsConfiguration,
                _ => SetupStatus::NeedsVerification,
            }
        };

        if desired != meta.setup_status {
            info!(
                "Migrating {} setup status {} -> {}",
                meta.id,
                meta.setup_status.as_str(),
                desired.as_str()
            );
            meta.setup_status = desired;
            registry.update_skill(meta)?;
            changed += 1;
        }
    }

    Ok(changed)
}
