//! Post-run Recorder
//!
//! Two independent, best-effort sinks invoked after a run has completed:
//! a knowledge-base summary (lazily creating one collection per skill) and
//! an append-only audit journal. Neither sink may alter or mask the run
//! outcome that was already returned to the caller; every failure here is
//! logged and swallowed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::executor::ExecutionResult;
use crate::registry::SkillRegistry;
use crate::types::{RunStatus, SkillMetadata};

/// Longest output preview stored in a knowledge summary
const OUTPUT_PREVIEW_CHARS: usize = 500;

/// External long-term memory store. Collections group all run summaries of
/// one skill so downstream learning can query them together.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn create_collection(&self, name: &str) -> anyhow::Result<String>;
    async fn add_entry(&self, collection_id: &str, text: &str, importance: f64)
        -> anyhow::Result<()>;
}

/// One line of the append-only run-history journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: DateTime<Utc>,
    pub skill_id: String,
    pub run_id: String,
    pub user_id: String,
    pub conversation_id: Option<String>,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub log_path: PathBuf,
}

/// Records run outcomes for audit and downstream learning
pub struct PostRunRecorder {
    config: Config,
    registry: Arc<SkillRegistry>,
    knowledge: Option<Arc<dyn KnowledgeStore>>,
}

impl PostRunRecorder {
    pub fn new(
        config: Config,
        registry: Arc<SkillRegistry>,
        knowledge: Option<Arc<dyn KnowledgeStore>>,
    ) -> Self {
        Self {
            config,
            registry,
            knowledge,
        }
    }

    /// Persist the outcome of a completed run. Infallible by contract: the
    /// run already happened, so nothing here may turn it into an error.
    pub async fn record(
        &self,
        result: &ExecutionResult,
        user_id: &str,
        conversation_id: Option<&str>,
    ) {
        if let Err(e) = self.record_to_knowledge(result).await {
            warn!(
                "Knowledge sink failed for run {} of {}: {}",
                result.run_id, result.skill_id, e
            );
        }

        if let Err(e) = self.append_journal(result, user_id, conversation_id) {
            warn!(
                "Journal append failed for run {} of {}: {}",
                result.run_id, result.skill_id, e
            );
        }
    }

    async fn record_to_knowledge(&self, result: &ExecutionResult) -> anyhow::Result<()> {
        let Some(store) = &self.knowledge else {
            return Ok(());
        };

        self.registry.load()?;
        let Some(meta) = self.registry.get_skill(&result.skill_id) else {
            anyhow::bail!("skill {} no longer registered", result.skill_id);
        };

        let collection_id = self.ensure_collection(store.as_ref(), meta).await?;

        let summary = summarize_run(result);
        // Failures matter more to downstream learning than routine successes
        let importance = match result.status {
            RunStatus::Failed => 0.8,
            RunStatus::Success => 0.4,
        };
        store.add_entry(&collection_id, &summary, importance).await?;
        debug!(
            "Recorded run {} of {} to collection {}",
            result.run_id, result.skill_id, collection_id
        );
        Ok(())
    }

    /// Reuse the stored collection id, creating it on first use. The id is
    /// persisted back onto the metadata so later runs skip the creation.
    async fn ensure_collection(
        &self,
        store: &dyn KnowledgeStore,
        mut meta: SkillMetadata,
    ) -> anyhow::Result<String> {
        if let Some(id) = &meta.knowledge_base_id {
            return Ok(id.clone());
        }

        let collection_id = store
            .create_collection(&format!("skill-runs-{}", meta.id))
            .await?;
        meta.knowledge_base_id = Some(collection_id.clone());
        if let Err(e) = self.registry.update_skill(meta) {
            // The collection exists either way; worst case the next run
            // creates a second one
            warn!("Could not persist knowledge collection id: {}", e);
        }
        Ok(collection_id)
    }

    fn append_journal(
        &self,
        result: &ExecutionResult,
        user_id: &str,
        conversation_id: Option<&str>,
    ) -> anyhow::Result<()> {
        let entry = JournalEntry {
            ts: Utc::now(),
            skill_id: result.skill_id.clone(),
            run_id: result.run_id.clone(),
            user_id: user_id.to_string(),
            conversation_id: conversation_id.map(str::to_string),
            status: result.status,
            exit_code: result.exit_code,
            duration_ms: result.duration_ms,
            log_path: result.log_path.clone(),
        };

        if let Some(parent) = self.config.journal_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut journal = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.journal_path)?;
        let line = serde_json::to_string(&entry)?;
        writeln!(journal, "{}", line)?;
        Ok(())
    }

    /// Read back the most recent journal entries in chronological order.
    /// Lines that fail to parse are skipped; the journal is append-only and
    /// a torn tail line must not hide the rest of the history.
    pub fn recent_entries(&self, limit: usize) -> Vec<JournalEntry> {
        let raw = match std::fs::read_to_string(&self.config.journal_path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };

        let mut entries: Vec<JournalEntry> = raw
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        entries
    }
}

/// Short natural-language summary of a run for the knowledge base
fn summarize_run(result: &ExecutionResult) -> String {
    let preview: String = result.stdout.chars().take(OUTPUT_PREVIEW_CHARS).collect();
    let preview = if preview.trim().is_empty() {
        "(no output)".to_string()
    } else {
        preview.trim().to_string()
    };

    format!(
        "Skill {} run {} finished with status {} in {}ms. Output: {} Log: {}",
        result.skill_id,
        result.run_id,
        result.status.as_str(),
        result.duration_ms,
        preview,
        result.log_path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct MockKnowledge {
        collections: Mutex<Vec<String>>,
        entries: Mutex<Vec<(String, String, f64)>>,
        fail: bool,
    }

    impl MockKnowledge {
        fn new(fail: bool) -> Self {
            Self {
                collections: Mutex::new(Vec::new()),
                entries: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl KnowledgeStore for MockKnowledge {
        async fn create_collection(&self, name: &str) -> anyhow::Result<String> {
            if self.fail {
                anyhow::bail!("knowledge base unavailable");
            }
            let id = format!("col-{}", name);
            self.collections.lock().push(id.clone());
            Ok(id)
        }

        async fn add_entry(
            &self,
            collection_id: &str,
            text: &str,
            importance: f64,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("knowledge base unavailable");
            }
            self.entries
                .lock()
                .push((collection_id.to_string(), text.to_string(), importance));
            Ok(())
        }
    }

    fn test_result(skill_id: &str, status: RunStatus) -> ExecutionResult {
        ExecutionResult {
            run_id: "run-1".to_string(),
            skill_id: skill_id.to_string(),
            status,
            exit_code: Some(if status == RunStatus::Success { 0 } else { 1 }),
            stdout: "the answer is 42".to_string(),
            stderr: String::new(),
            log_path: PathBuf::from("/logs/run-1.log"),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            duration_ms: 12,
            timed_out: false,
        }
    }

    fn test_recorder(knowledge: Option<Arc<dyn KnowledgeStore>>) -> (PostRunRecorder, tempfile::TempDir) {
        let temp = tempfile::TempDir::new().unwrap();
        let config = Config::with_data_dir(temp.path().to_path_buf(), 300);
        let registry = Arc::new(SkillRegistry::open(&config).unwrap());
        (PostRunRecorder::new(config, registry, knowledge), temp)
    }

    #[tokio::test]
    async fn test_journal_appends_one_line_per_run() {
        let (recorder, _temp) = test_recorder(None);

        recorder
            .record(&test_result("test-echo", RunStatus::Success), "user-1", Some("conv-9"))
            .await;
        recorder
            .record(&test_result("test-echo", RunStatus::Failed), "user-1", None)
            .await;

        let entries = recorder.recent_entries(10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, RunStatus::Success);
        assert_eq!(entries[0].conversation_id.as_deref(), Some("conv-9"));
        assert_eq!(entries[1].status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_recent_entries_skips_torn_lines() {
        let (recorder, _temp) = test_recorder(None);
        recorder
            .record(&test_result("test-echo", RunStatus::Success), "user-1", None)
            .await;

        // Simulate a torn tail write
        let mut journal = std::fs::OpenOptions::new()
            .append(true)
            .open(&recorder.config.journal_path)
            .unwrap();
        writeln!(journal, "{{\"ts\": \"2026-01-").unwrap();

        let entries = recorder.recent_entries(10);
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_knowledge_store_never_blocks_recording() {
        let store: Arc<dyn KnowledgeStore> = Arc::new(MockKnowledge::new(true));
        let (recorder, _temp) = test_recorder(Some(store));

        // Must not panic or error; the journal still gets its line
        recorder
            .record(&test_result("test-echo", RunStatus::Success), "user-1", None)
            .await;
        assert_eq!(recorder.recent_entries(10).len(), 1);
    }

    #[tokio::test]
    async fn test_failure_summaries_carry_higher_importance() {
        let mock = Arc::new(MockKnowledge::new(false));
        let store: Arc<dyn KnowledgeStore> = mock.clone();
        let (recorder, _temp) = test_recorder(Some(store));

        // Register the skill so the knowledge sink can resolve it
        let config = Config::with_data_dir(_temp.path().to_path_buf(), 300);
        let registry = SkillRegistry::open(&config).unwrap();
        registry
            .register(crate::registry::tests::test_meta("test-echo"))
            .unwrap();

        recorder
            .record(&test_result("test-echo", RunStatus::Success), "user-1", None)
            .await;
        recorder
            .record(&test_result("test-echo", RunStatus::Failed), "user-1", None)
            .await;

        let entries = mock.entries.lock();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].2 < entries[1].2);
        assert!(entries[0].1.contains("the answer is 42"));

        // One collection, created lazily and reused
        assert_eq!(mock.collections.lock().len(), 1);
    }
}
