//! Skill Metadata Model
//!
//! Core data structures for installed skills: identity, provenance,
//! execution contract, capabilities, safety classification, and the
//! lifecycle state that gates automatic execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Runtime category used to invoke a skill's entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Python script entry point
    Python,
    /// Node.js script entry point
    Node,
    /// Generic command-line executable
    Command,
    /// Documentation-only skill, never executed automatically
    Manual,
}

impl ExecutorKind {
    /// Kinds the sandbox can actually spawn a process for
    pub fn is_executable(&self) -> bool {
        !matches!(self, Self::Manual)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
            Self::Command => "command",
            Self::Manual => "manual",
        }
    }
}

/// Lifecycle gate: may this skill be run automatically?
///
/// Nothing is ever auto-promoted to `Ready`; that transition is reserved
/// for explicit operator action (or future verification tooling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupStatus {
    /// Verified runnable
    Ready,
    /// Declares environment overrides that still need values
    NeedsConfiguration,
    /// Installed but not yet verified (conservative default)
    NeedsVerification,
    /// Non-executable kind; permanent
    ManualOnly,
    /// Explicitly switched off
    Disabled,
}

impl SetupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::NeedsConfiguration => "needs_configuration",
            Self::NeedsVerification => "needs_verification",
            Self::ManualOnly => "manual_only",
            Self::Disabled => "disabled",
        }
    }
}

/// Installed/disabled flag, independent of the setup lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillStatus {
    Installed,
    Disabled,
}

/// Outcome of a single execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Provenance of an installed skill. Immutable after import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySource {
    /// Where the skill was fetched from (URL or local path)
    pub origin_url: String,
    /// Resolved repository identifier (owner/name where derivable)
    pub repository: String,
    /// Revision that was installed (commit hash, or "local")
    pub revision: String,
    /// Declared license, if any
    pub license: Option<String>,
    /// When the import happened
    pub imported_at: DateTime<Utc>,
}

/// Execution contract declared by the skill's manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSpec {
    pub kind: ExecutorKind,
    /// Command string; for executable kinds the first token must exist as
    /// a file under the install directory (validated at import)
    pub entry_point: String,
    /// Interpreter override (e.g. "python3.11")
    pub runtime_hint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment overrides merged over the host environment at run time
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Skill needs GPU or similar elevated resources
    #[serde(default)]
    pub requires_gpu: bool,
}

fn default_timeout_secs() -> u64 {
    300
}

/// A declared area of competence; used for discovery and search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub domain: String,
    pub description: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Risk tier assigned to a skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
    Unknown,
}

/// Review state; starts unreviewed and is only changed by a human
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Unreviewed,
    Approved,
    Rejected,
}

/// Safety classification attached at import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyClassification {
    pub risk: RiskTier,
    #[serde(default)]
    pub notes: String,
    pub review: ReviewStatus,
}

impl Default for SafetyClassification {
    fn default() -> Self {
        Self {
            risk: RiskTier::Unknown,
            notes: String::new(),
            review: ReviewStatus::Unreviewed,
        }
    }
}

/// Complete record of one installed skill (the registry's unit of storage)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMetadata {
    /// Stable id: slug(vendor)-slug(name), unique within the registry
    pub id: String,
    pub name: String,
    pub vendor: String,
    pub description: String,
    /// Semantic version string from the manifest
    pub version: String,
    /// SHA-256 over all installed files, for drift detection
    pub checksum: String,
    pub source: CapabilitySource,
    pub executor: ExecutorSpec,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub safety: SafetyClassification,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub test_refs: Vec<String>,
    /// Install directory relative to the data root; never absolute, so the
    /// registry file stays portable
    pub install_path: PathBuf,
    pub status: SkillStatus,
    pub setup_status: SetupStatus,
    /// Linked knowledge-base collection, created lazily on first recorded run
    #[serde(default)]
    pub knowledge_base_id: Option<String>,
    #[serde(default)]
    pub health_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub health_notes: Option<String>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_run_status: Option<RunStatus>,
    /// Optimistic concurrency token; bumped on every registry write of
    /// this record
    #[serde(default)]
    pub record_version: u64,
}

impl SkillMetadata {
    /// Stable id derivation shared by import and lookup
    pub fn derive_id(vendor: &str, name: &str) -> String {
        format!("{}-{}", slugify(vendor), slugify(name))
    }
}

/// Lowercase slug: alphanumeric runs joined by single dashes
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Weather Skill"), "my-weather-skill");
        assert_eq!(slugify("acme_tools"), "acme-tools");
        assert_eq!(slugify("--Already--Sluggy--"), "already-sluggy");
        assert_eq!(slugify("v2.1"), "v2-1");
    }

    #[test]
    fn test_derive_id() {
        assert_eq!(
            SkillMetadata::derive_id("Acme Corp", "Weather Fetcher"),
            "acme-corp-weather-fetcher"
        );
    }

    #[test]
    fn test_executor_kind_executable() {
        assert!(ExecutorKind::Python.is_executable());
        assert!(ExecutorKind::Node.is_executable());
        assert!(ExecutorKind::Command.is_executable());
        assert!(!ExecutorKind::Manual.is_executable());
    }

    #[test]
    fn test_executor_spec_default_timeout() {
        let spec: ExecutorSpec = serde_json::from_str(
            r#"{"kind": "command", "entry_point": "run.sh"}"#,
        )
        .unwrap();
        assert_eq!(spec.timeout_secs, 300);
        assert!(spec.environment.is_empty());
        assert!(!spec.requires_gpu);
    }

    #[test]
    fn test_safety_defaults_unreviewed() {
        let safety = SafetyClassification::default();
        assert_eq!(safety.review, ReviewStatus::Unreviewed);
        assert_eq!(safety.risk, RiskTier::Unknown);
    }
}
