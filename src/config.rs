//! Configuration management

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Skill host configuration
///
/// All paths live under a single data root so the whole tree (registry,
/// installed skills, logs, journal) can be relocated together. Skill
/// install paths are stored relative to `data_dir` for the same reason.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for all skill host state
    pub data_dir: PathBuf,

    /// Registry document path (single JSON file, read/written wholesale)
    pub registry_path: PathBuf,

    /// Root of the managed install tree (skills/<vendor>/<name>)
    pub skills_dir: PathBuf,

    /// Root of the per-skill log directories
    pub logs_dir: PathBuf,

    /// Append-only run-history journal (line-delimited JSON)
    pub journal_path: PathBuf,

    /// Timeout floor applied when neither the caller nor the metadata
    /// declares one
    pub default_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("SKILLHOST_DATA_DIR")
            .map(|v| PathBuf::from(shellexpand::tilde(&v).into_owned()))
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("skillhost")
            });

        let default_timeout_secs = std::env::var("SKILLHOST_DEFAULT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        Ok(Self::with_data_dir(data_dir, default_timeout_secs))
    }

    /// Build a configuration rooted at an explicit data directory
    pub fn with_data_dir(data_dir: PathBuf, default_timeout_secs: u64) -> Self {
        let registry_path = data_dir.join("registry.json");
        let skills_dir = data_dir.join("skills");
        let logs_dir = data_dir.join("logs");
        let journal_path = data_dir.join("runs.jsonl");

        Self {
            data_dir,
            registry_path,
            skills_dir,
            logs_dir,
            journal_path,
            default_timeout_secs,
        }
    }

    /// Resolve a registry-relative install path to an absolute directory
    pub fn resolve_install_path(&self, relative: &Path) -> PathBuf {
        self.data_dir.join(relative)
    }
}
