//! Skill Host
//!
//! Skill registry and execution sandbox for the assistant platform:
//! installs third-party skills from external repositories and runs them as
//! isolated, time-bounded child processes with a durable lifecycle record
//! and an audit trail.
//!
//! # Architecture
//!
//! ```text
//! install_skill ──► Importer ──► Registry (registry.json)
//!                      │              ▲
//!                fetch + manifest     │ reload
//!                + checksum           │
//!                                     │
//! run ──────────► Runner ──► Adapter ──► child process
//!                    │        (python / node / command)
//!                    │ isolated working copy, hard timeout
//!                    ▼
//!              ExecutionResult ──► Post-run Recorder
//!                                  ├── knowledge base (best effort)
//!                                  └── runs.jsonl audit journal
//! ```
//!
//! # Guarantees
//!
//! - Execution never touches the install directory: every run gets its own
//!   disposable working copy, removed on all exit paths.
//! - Timeouts are hard wall-clock deadlines; an expired child is killed and
//!   reported as a failed result, never left hanging.
//! - The registry document on disk always matches what the last mutating
//!   call observed; stale concurrent updates fail instead of clobbering.
//! - Post-run recording is best-effort and can never alter a run outcome.

pub mod config;
pub mod executor;
pub mod fsutil;
pub mod health;
pub mod importer;
pub mod manifest;
pub mod recorder;
pub mod registry;
pub mod runner;
pub mod types;

pub use config::Config;
pub use executor::{ExecutionContext, ExecutionResult, RunError, PAYLOAD_ENV_VAR};
pub use health::{health_check, migrate_setup_statuses, HealthReport};
pub use importer::{DiscoveryIndex, ImportError, SkillImporter};
pub use recorder::{JournalEntry, KnowledgeStore, PostRunRecorder};
pub use registry::{RegistryError, SkillRegistry};
pub use runner::SkillRunner;
pub use types::{
    Capability, CapabilitySource, ExecutorKind, ExecutorSpec, RunStatus, SafetyClassification,
    SetupStatus, SkillMetadata, SkillStatus,
};
