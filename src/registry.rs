//! Skill Registry
//!
//! Durable store of all installed skill metadata. The registry is a single
//! JSON document read and written wholesale; every mutating call saves
//! before returning, so the on-disk document always matches the in-memory
//! state the caller observed. Writers are serialized in-process by holding
//! the registry mutex across mutate+save, and each record carries an
//! optimistic `record_version` token so a stale update fails instead of
//! clobbering a concurrent one.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::types::SkillMetadata;

/// Registry operation errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Skill not registered: {0}")]
    NotRegistered(String),
    #[error("Stale update for skill {id}: expected version {expected}, got {got}")]
    VersionConflict { id: String, expected: u64, got: u64 },
    #[error("Registry file is corrupt: {0}")]
    Corrupt(String),
    #[error("Registry I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// On-disk shape of the registry document
#[derive(Debug, Serialize, Deserialize)]
struct RegistryDocument {
    updated_at: DateTime<Utc>,
    skills: Vec<SkillMetadata>,
}

/// Durable registry of installed skills
pub struct SkillRegistry {
    path: PathBuf,
    skills: Mutex<HashMap<String, SkillMetadata>>,
}

impl SkillRegistry {
    /// Open the registry, loading the document if it exists
    pub fn open(config: &Config) -> RegistryResult<Self> {
        let registry = Self {
            path: config.registry_path.clone(),
            skills: Mutex::new(HashMap::new()),
        };
        registry.load()?;
        Ok(registry)
    }

    /// (Re)read the on-disk document. A missing file is an empty registry,
    /// not an error.
    pub fn load(&self) -> RegistryResult<()> {
        let mut skills = self.skills.lock();
        skills.clear();

        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No registry file at {}, starting empty", self.path.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let document: RegistryDocument =
            serde_json::from_str(&raw).map_err(|e| RegistryError::Corrupt(e.to_string()))?;

        for skill in document.skills {
            skills.insert(skill.id.clone(), skill);
        }
        debug!("Loaded {} skills from {}", skills.len(), self.path.display());
        Ok(())
    }

    /// List all skills, sorted by id
    pub fn list_skills(&self) -> Vec<SkillMetadata> {
        let skills = self.skills.lock();
        let mut list: Vec<SkillMetadata> = skills.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// Fetch one skill by id
    pub fn get_skill(&self, id: &str) -> Option<SkillMetadata> {
        self.skills.lock().get(id).cloned()
    }

    pub fn skill_exists(&self, id: &str) -> bool {
        self.skills.lock().contains_key(id)
    }

    /// Insert-or-replace a skill record and save immediately.
    ///
    /// A replace carries the stored record's version forward, so re-import
    /// of the same id updates in place without tripping the version check.
    pub fn register(&self, mut meta: SkillMetadata) -> RegistryResult<SkillMetadata> {
        let mut skills = self.skills.lock();
        meta.record_version = match skills.get(&meta.id) {
            Some(existing) => existing.record_version + 1,
            None => 1,
        };
        info!("Registering skill {} (v{})", meta.id, meta.record_version);
        skills.insert(meta.id.clone(), meta.clone());
        self.save_locked(&skills)?;
        Ok(meta)
    }

    /// Replace an existing record; fails if the skill is unknown or the
    /// caller's copy is stale.
    pub fn update_skill(&self, mut meta: SkillMetadata) -> RegistryResult<SkillMetadata> {
        let mut skills = self.skills.lock();
        let stored = skills
            .get(&meta.id)
            .ok_or_else(|| RegistryError::NotRegistered(meta.id.clone()))?;

        if meta.record_version != stored.record_version {
            return Err(RegistryError::VersionConflict {
                id: meta.id.clone(),
                expected: stored.record_version,
                got: meta.record_version,
            });
        }

        meta.record_version += 1;
        skills.insert(meta.id.clone(), meta.clone());
        self.save_locked(&skills)?;
        Ok(meta)
    }

    /// Delete a skill record by id
    pub fn remove_skill(&self, id: &str) -> RegistryResult<SkillMetadata> {
        let mut skills = self.skills.lock();
        let removed = skills
            .remove(id)
            .ok_or_else(|| RegistryError::NotRegistered(id.to_string()))?;
        self.save_locked(&skills)?;
        info!("Removed skill {}", id);
        Ok(removed)
    }

    /// Write the whole document: serialize to a sibling temp file, then
    /// rename into place so readers never see a partial document.
    fn save_locked(&self, skills: &HashMap<String, SkillMetadata>) -> RegistryResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut list: Vec<&SkillMetadata> = skills.values().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));

        let document = serde_json::json!({
            "updated_at": Utc::now(),
            "skills": list,
        });
        let raw = serde_json::to_string_pretty(&document)
            .map_err(|e| RegistryError::Corrupt(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
