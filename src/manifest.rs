//! Skill Manifest Handling
//!
//! Locates and parses the declarative manifest inside a skill's source
//! tree. Structured manifests (`skill.toml`, `skill.json`) parse directly;
//! documentation manifests (`SKILL.md`, `README.md`) normalize to a minimal
//! manual-only skill using the first heading as the name.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::importer::ImportError;
use crate::types::{Capability, ExecutorKind, ExecutorSpec};

/// Manifest filenames tried in order, first inside the declared subpath,
/// then at the repository root
pub const MANIFEST_CANDIDATES: &[&str] = &["skill.toml", "skill.json", "SKILL.md", "README.md"];

/// Normalized manifest contents, independent of source format
#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    pub skill: RawSkillSection,
    #[serde(default)]
    pub executor: Option<RawExecutorSection>,
    #[serde(default)]
    pub capabilities: Vec<RawCapability>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub tests: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSkillSection {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawExecutorSection {
    pub kind: ExecutorKind,
    #[serde(default)]
    pub entry_point: String,
    #[serde(default)]
    pub runtime_hint: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub requires_gpu: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCapability {
    pub domain: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RawManifest {
    /// Build the execution contract. A missing executor block means the
    /// skill is documentation-only.
    pub fn executor_spec(&self, default_timeout_secs: u64) -> ExecutorSpec {
        match &self.executor {
            Some(raw) => ExecutorSpec {
                kind: raw.kind,
                entry_point: raw.entry_point.clone(),
                runtime_hint: raw.runtime_hint.clone(),
                timeout_secs: raw.timeout_secs.unwrap_or(default_timeout_secs),
                environment: raw.environment.clone(),
                requires_gpu: raw.requires_gpu,
            },
            None => ExecutorSpec {
                kind: ExecutorKind::Manual,
                entry_point: String::new(),
                runtime_hint: None,
                timeout_secs: default_timeout_secs,
                environment: HashMap::new(),
                requires_gpu: false,
            },
        }
    }

    /// Capability list, defaulting to one generic capability built from the
    /// skill description when none are declared
    pub fn capabilities(&self) -> Vec<Capability> {
        if self.capabilities.is_empty() {
            return vec![Capability {
                domain: "general".to_string(),
                description: self.skill.description.clone(),
                triggers: Vec::new(),
                tags: Vec::new(),
            }];
        }
        self.capabilities
            .iter()
            .map(|raw| Capability {
                domain: raw.domain.clone(),
                description: raw.description.clone(),
                triggers: raw.triggers.clone(),
                tags: raw.tags.clone(),
            })
            .collect()
    }
}

/// Find the manifest file. The declared subpath is searched before the
/// repository root so a monorepo can host several skills.
pub fn locate_manifest(root: &Path, subpath: Option<&str>) -> Result<PathBuf, ImportError> {
    let mut search_dirs = Vec::new();
    if let Some(sub) = subpath {
        search_dirs.push(root.join(sub));
    }
    search_dirs.push(root.to_path_buf());

    for dir in &search_dirs {
        for candidate in MANIFEST_CANDIDATES {
            let path = dir.join(candidate);
            if path.is_file() {
                debug!("Found manifest at {}", path.display());
                return Ok(path);
            }
        }
    }

    Err(ImportError::ManifestNotFound {
        searched: search_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Parse a located manifest by extension
pub fn parse_manifest(path: &Path) -> Result<RawManifest, ImportError> {
    let content = std::fs::read_to_string(path)?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match extension {
        "toml" => toml::from_str(&content)
            .map_err(|e| ImportError::Parse(format!("{}: {}", path.display(), e))),
        "json" => serde_json::from_str(&content)
            .map_err(|e| ImportError::Parse(format!("{}: {}", path.display(), e))),
        "md" => Ok(normalize_markdown(&content, path)),
        other => Err(ImportError::UnsupportedFormat(other.to_string())),
    }
}

/// Normalize a documentation manifest: first `#` heading becomes the name,
/// the remaining prose the description. Such skills carry no executor and
/// stay manual-only for their whole lifecycle.
fn normalize_markdown(content: &str, path: &Path) -> RawManifest {
    let mut name = None;
    let mut body = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if name.is_none() {
            if let Some(heading) = trimmed.strip_prefix('#') {
                name = Some(heading.trim_start_matches('#').trim().to_string());
                continue;
            }
        }
        if !trimmed.starts_with('#') {
            body.push(trimmed);
        }
    }

    let name = name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| {
            // No heading at all: fall back to the containing directory name
            path.parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or("unnamed-skill")
                .to_string()
        });

    let description = body.join(" ").trim().chars().take(500).collect::<String>();

    RawManifest {
        skill: RawSkillSection {
            name,
            version: default_version(),
            description,
            vendor: None,
            license: None,
        },
        executor: None,
        capabilities: Vec::new(),
        examples: Vec::new(),
        dependencies: Vec::new(),
        tests: Vec::new(),
    }
}
