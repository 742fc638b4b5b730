//! Skill Importer
//!
//! Brings a skill from an external source repository into the managed
//! install tree: fetch into a disposable directory, locate and parse the
//! manifest, validate the execution contract, compute the content checksum,
//! and register the resulting metadata. Any failure aborts before
//! registration, leaving the registry unchanged; the fetch directory is
//! removed on every path.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::fsutil;
use crate::manifest;
use crate::registry::{RegistryError, SkillRegistry};
use crate::types::{
    CapabilitySource, SafetyClassification, SetupStatus, SkillMetadata, SkillStatus, slugify,
};

/// Import failures. All of them abort the import before registration.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("No manifest found (searched: {searched})")]
    ManifestNotFound { searched: String },
    #[error("Unsupported manifest format: {0}")]
    UnsupportedFormat(String),
    #[error("Entry point '{entry}' does not exist under {dir}")]
    EntryPointMissing { entry: String, dir: String },
    #[error("Failed to fetch source: {0}")]
    Fetch(String),
    #[error("Failed to parse manifest: {0}")]
    Parse(String),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// External discovery index notified after a successful registration.
/// Strictly best-effort: a notification failure never fails the import.
#[async_trait]
pub trait DiscoveryIndex: Send + Sync {
    async fn skill_registered(&self, skill: &SkillMetadata) -> anyhow::Result<()>;
}

/// A source repository materialized in a disposable directory
struct FetchedSource {
    /// Drop guard: deletes the fetch directory on success and failure alike
    _temp: TempDir,
    root: PathBuf,
    origin_url: String,
    repository: String,
    revision: String,
}

/// Installs skills into the registry's managed tree
pub struct SkillImporter {
    config: Config,
    registry: Arc<SkillRegistry>,
    discovery: Option<Arc<dyn DiscoveryIndex>>,
}

impl SkillImporter {
    pub fn new(config: Config, registry: Arc<SkillRegistry>) -> Self {
        Self {
            config,
            registry,
            discovery: None,
        }
    }

    pub fn with_discovery_index(mut self, index: Arc<dyn DiscoveryIndex>) -> Self {
        self.discovery = Some(index);
        self
    }

    /// Fetch, validate, install, and register a skill.
    ///
    /// Re-importing a source that derives the same id replaces the existing
    /// record and install directory; the registry never grows a duplicate.
    pub async fn install_skill(
        &self,
        source: &str,
        name_override: Option<&str>,
        subpath: Option<&str>,
    ) -> Result<SkillMetadata, ImportError> {
        let fetched = fetch_source(source).await?;

        let manifest_path = manifest::locate_manifest(&fetched.root, subpath)?;
        let raw = manifest::parse_manifest(&manifest_path)?;
        let manifest_dir = manifest_path
            .parent()
            .unwrap_or(&fetched.root)
            .to_path_buf();

        let name = name_override.unwrap_or(&raw.skill.name).to_string();
        let vendor = raw
            .skill
            .vendor
            .clone()
            .unwrap_or_else(|| vendor_from_repository(&fetched.repository));
        let id = SkillMetadata::derive_id(&vendor, &name);

        // Install: replace any previous copy under skills/<vendor>/<name>
        let relative_install = Path::new("skills")
            .join(slugify(&vendor))
            .join(slugify(&name));
        let install_dir = self.config.resolve_install_path(&relative_install);
        replace_dir(&manifest_dir, &install_dir).await?;

        let checksum = {
            let dir = install_dir.clone();
            tokio::task::spawn_blocking(move || fsutil::checksum_dir(&dir))
                .await
                .map_err(|e| ImportError::Fetch(format!("checksum task failed: {}", e)))??
        };

        let executor = raw.executor_spec(self.config.default_timeout_secs);

        // An executable skill whose entry point does not resolve to a file
        // could never run; refuse it before it reaches the registry.
        if executor.kind.is_executable() {
            let entry_file = executor.entry_point.split_whitespace().next().unwrap_or("");
            if entry_file.is_empty() || !install_dir.join(entry_file).is_file() {
                let _ = std::fs::remove_dir_all(&install_dir);
                return Err(ImportError::EntryPointMissing {
                    entry: executor.entry_point.clone(),
                    dir: relative_install.display().to_string(),
                });
            }
        }

        let setup_status = initial_setup_status(&executor.kind, &executor.environment);

        let meta = SkillMetadata {
            id: id.clone(),
            name,
            vendor,
            description: raw.skill.description.clone(),
            version: raw.skill.version.clone(),
            checksum,
            source: CapabilitySource {
                origin_url: fetched.origin_url.clone(),
                repository: fetched.repository.clone(),
                revision: fetched.revision.clone(),
                license: raw.skill.license.clone(),
                imported_at: Utc::now(),
            },
            executor,
            capabilities: raw.capabilities(),
            safety: SafetyClassification::default(),
            examples: raw.examples.clone(),
            dependencies: raw.dependencies.clone(),
            test_refs: raw.tests.clone(),
            install_path: relative_install,
            status: SkillStatus::Installed,
            setup_status,
            knowledge_base_id: None,
            health_checked_at: None,
            health_notes: None,
            last_run_at: None,
            last_run_status: None,
            record_version: 0,
        };

        let stored = self.registry.register(meta)?;
        info!(
            "Installed skill {} v{} ({})",
            stored.id, stored.version, stored.setup_status.as_str()
        );

        if let Some(index) = &self.discovery {
            if let Err(e) = index.skill_registered(&stored).await {
                warn!("Discovery index notification failed for {}: {}", stored.id, e);
            }
        }

        Ok(stored)
    }

    /// Remove a skill: registry record plus its install directory
    pub async fn uninstall_skill(&self, id: &str) -> Result<SkillMetadata, ImportError> {
        let removed = self.registry.remove_skill(id)?;
        let install_dir = self.config.resolve_install_path(&removed.install_path);
        if let Err(e) = tokio::fs::remove_dir_all(&install_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove install dir {}: {}", install_dir.display(), e);
            }
        }
        Ok(removed)
    }
}

/// Initial lifecycle gate, decided in fixed order: non-executable kinds are
/// permanently manual; declared environment overrides mean configuration is
/// pending; everything else waits for verification. Never `Ready`.
fn initial_setup_status(
    kind: &crate::types::ExecutorKind,
    environment: &std::collections::HashMap<String, String>,
) -> SetupStatus {
    if !kind.is_executable() {
        SetupStatus::ManualOnly
    } else if !environment.is_empty() {
        SetupStatus::NeedsConfiguration
    } else {
        SetupStatus::NeedsVerification
    }
}

/// Materialize the source in a disposable directory: shallow git clone for
/// remote URLs, plain copy for local paths.
async fn fetch_source(source: &str) -> Result<FetchedSource, ImportError> {
    let temp = tempfile::Builder::new()
        .prefix("skillhost-fetch-")
        .tempdir()?;
    let root = temp.path().to_path_buf();

    if is_remote_source(source) {
        let url = source.to_string();
        let clone_root = root.clone();
        let revision = tokio::task::spawn_blocking(move || clone_shallow(&url, &clone_root))
            .await
            .map_err(|e| ImportError::Fetch(format!("clone task failed: {}", e)))??;

        Ok(FetchedSource {
            _temp: temp,
            root,
            origin_url: source.to_string(),
            repository: repository_from_url(source),
            revision,
        })
    } else {
        let src = PathBuf::from(source);
        if !src.is_dir() {
            return Err(ImportError::Fetch(format!(
                "local source is not a directory: {}",
                source
            )));
        }
        let dst = root.clone();
        let copy_src = src.clone();
        tokio::task::spawn_blocking(move || fsutil::copy_dir_recursive(&copy_src, &dst))
            .await
            .map_err(|e| ImportError::Fetch(format!("copy task failed: {}", e)))??;

        let repository = src
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("local")
            .to_string();
        Ok(FetchedSource {
            _temp: temp,
            root,
            origin_url: source.to_string(),
            repository: format!("local/{}", repository),
            revision: "local".to_string(),
        })
    }
}

fn is_remote_source(source: &str) -> bool {
    source.starts_with("http://")
        || source.starts_with("https://")
        || source.starts_with("git@")
        || source.starts_with("ssh://")
}

/// Shallow single-revision clone, returning the HEAD commit id
fn clone_shallow(url: &str, into: &Path) -> Result<String, ImportError> {
    let mut fetch_opts = git2::FetchOptions::new();
    fetch_opts.depth(1);

    let repo = git2::build::RepoBuilder::new()
        .fetch_options(fetch_opts)
        .clone(url, into)
        .map_err(|e| ImportError::Fetch(format!("{}: {}", url, e.message())))?;

    let revision = repo
        .head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok())
        .map(|commit| commit.id().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    debug!("Cloned {} at {}", url, revision);
    Ok(revision)
}

/// "owner/name" from common git URL shapes
fn repository_from_url(url: &str) -> String {
    let trimmed = url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .replace(':', "/");
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [.., owner, name] => format!("{}/{}", owner, name),
        [name] => (*name).to_string(),
        [] => url.to_string(),
    }
}

fn vendor_from_repository(repository: &str) -> String {
    repository
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Replace `dst` with a fresh copy of `src` (blocking work off the runtime)
async fn replace_dir(src: &Path, dst: &Path) -> Result<(), ImportError> {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    tokio::task::spawn_blocking(move || {
        match std::fs::remove_dir_all(&dst) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fsutil::copy_dir_recursive(&src, &dst)
    })
    .await
    .map_err(|e| ImportError::Fetch(format!("install task failed: {}", e)))??;
    Ok(())
}
