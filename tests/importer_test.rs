//! Importer Integration Tests
//!
//! Install skills from local source directories and check the registry
//! contract: stable ids, in-place re-import, validation failures that leave
//! the registry untouched.

use async_trait::async_trait;
use skillhost::{
    Config, DiscoveryIndex, ExecutorKind, ImportError, SetupStatus, SkillImporter, SkillMetadata,
    SkillRegistry,
};
use std::sync::Arc;
use tempfile::TempDir;

fn test_env() -> (Config, Arc<SkillRegistry>, SkillImporter, TempDir) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let config = Config::with_data_dir(temp.path().join("data"), 300);
    let registry = Arc::new(SkillRegistry::open(&config).expect("Failed to open registry"));
    let importer = SkillImporter::new(config.clone(), registry.clone());
    (config, registry, importer, temp)
}

/// Write a minimal command-line skill source: manifest + entry script
fn write_command_skill(dir: &std::path::Path, name: &str, entry: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join("skill.toml"),
        format!(
            r#"
[skill]
name = "{name}"
version = "1.0.0"
description = "test skill {name}"
vendor = "acme"

[executor]
kind = "command"
entry_point = "{entry}"
"#
        ),
    )
    .unwrap();
    std::fs::write(dir.join("run.sh"), "#!/bin/sh\necho ok\n").unwrap();
}

#[tokio::test]
async fn test_install_from_local_directory() {
    let (config, _registry, importer, temp) = test_env();
    let source = temp.path().join("src/echo-skill");
    write_command_skill(&source, "Echo Skill", "./run.sh");

    let meta = importer
        .install_skill(source.to_str().unwrap(), None, None)
        .await
        .expect("Install failed");

    assert_eq!(meta.id, "acme-echo-skill");
    assert_eq!(meta.vendor, "acme");
    assert_eq!(meta.version, "1.0.0");
    assert_eq!(meta.executor.kind, ExecutorKind::Command);
    assert_eq!(meta.setup_status, SetupStatus::NeedsVerification);
    assert!(!meta.checksum.is_empty());
    assert_eq!(meta.source.revision, "local");

    // Install path is relative and resolves to a real directory
    assert!(meta.install_path.is_relative());
    let install_dir = config.resolve_install_path(&meta.install_path);
    assert!(install_dir.join("skill.toml").is_file());
    assert!(install_dir.join("run.sh").is_file());

    // No capabilities declared: one generic capability from the description
    assert_eq!(meta.capabilities.len(), 1);
    assert_eq!(meta.capabilities[0].domain, "general");
}

#[tokio::test]
async fn test_reimport_updates_in_place() {
    let (_config, registry, importer, temp) = test_env();
    let source = temp.path().join("src/stable");
    write_command_skill(&source, "Stable", "./run.sh");

    let first = importer
        .install_skill(source.to_str().unwrap(), None, None)
        .await
        .unwrap();

    // Change the source and import again
    std::fs::write(source.join("run.sh"), "#!/bin/sh\necho changed\n").unwrap();
    let second = importer
        .install_skill(source.to_str().unwrap(), None, None)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_ne!(first.checksum, second.checksum);
    assert!(second.record_version > first.record_version);
    assert_eq!(registry.list_skills().len(), 1);
}

#[tokio::test]
async fn test_missing_entry_point_aborts_import() {
    let (_config, registry, importer, temp) = test_env();
    let source = temp.path().join("src/broken");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(
        source.join("skill.toml"),
        r#"
[skill]
name = "broken"
vendor = "acme"

[executor]
kind = "command"
entry_point = "./does-not-exist.sh"
"#,
    )
    .unwrap();

    let err = importer
        .install_skill(source.to_str().unwrap(), None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::EntryPointMissing { .. }));
    assert!(registry.list_skills().is_empty());
}

#[tokio::test]
async fn test_missing_manifest_aborts_import() {
    let (_config, registry, importer, temp) = test_env();
    let source = temp.path().join("src/empty");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("notes.txt"), "nothing declarative here").unwrap();

    let err = importer
        .install_skill(source.to_str().unwrap(), None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::ManifestNotFound { .. }));
    assert!(registry.list_skills().is_empty());
}

#[tokio::test]
async fn test_markdown_manifest_installs_manual_only() {
    let (_config, _registry, importer, temp) = test_env();
    let source = temp.path().join("src/docs-only");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(
        source.join("SKILL.md"),
        "# Packing List\n\nChecklist for trips; ask the assistant to read it aloud.\n",
    )
    .unwrap();

    let meta = importer
        .install_skill(source.to_str().unwrap(), None, None)
        .await
        .unwrap();

    assert_eq!(meta.name, "Packing List");
    assert_eq!(meta.executor.kind, ExecutorKind::Manual);
    assert_eq!(meta.setup_status, SetupStatus::ManualOnly);
}

#[tokio::test]
async fn test_declared_environment_needs_configuration() {
    let (_config, _registry, importer, temp) = test_env();
    let source = temp.path().join("src/needs-key");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(
        source.join("skill.toml"),
        r#"
[skill]
name = "needs-key"
vendor = "acme"

[executor]
kind = "command"
entry_point = "./run.sh"

[executor.environment]
WEATHER_API_KEY = ""
"#,
    )
    .unwrap();
    std::fs::write(source.join("run.sh"), "#!/bin/sh\necho ok\n").unwrap();

    let meta = importer
        .install_skill(source.to_str().unwrap(), None, None)
        .await
        .unwrap();
    assert_eq!(meta.setup_status, SetupStatus::NeedsConfiguration);
}

#[tokio::test]
async fn test_subpath_manifest_wins_over_root() {
    let (_config, _registry, importer, temp) = test_env();
    let source = temp.path().join("src/monorepo");
    write_command_skill(&source, "Root Skill", "./run.sh");
    write_command_skill(&source.join("skills/inner"), "Inner Skill", "./run.sh");

    let meta = importer
        .install_skill(source.to_str().unwrap(), None, Some("skills/inner"))
        .await
        .unwrap();
    assert_eq!(meta.id, "acme-inner-skill");
}

#[tokio::test]
async fn test_name_override() {
    let (_config, _registry, importer, temp) = test_env();
    let source = temp.path().join("src/renamed");
    write_command_skill(&source, "Original", "./run.sh");

    let meta = importer
        .install_skill(source.to_str().unwrap(), Some("Better Name"), None)
        .await
        .unwrap();
    assert_eq!(meta.id, "acme-better-name");
    assert_eq!(meta.name, "Better Name");
}

struct BrokenIndex;

#[async_trait]
impl DiscoveryIndex for BrokenIndex {
    async fn skill_registered(&self, _skill: &SkillMetadata) -> anyhow::Result<()> {
        anyhow::bail!("index offline")
    }
}

#[tokio::test]
async fn test_discovery_failure_does_not_fail_import() {
    let (_config, registry, _importer, temp) = test_env();
    let source = temp.path().join("src/indexed");
    write_command_skill(&source, "Indexed", "./run.sh");

    let importer = SkillImporter::new(
        Config::with_data_dir(temp.path().join("data"), 300),
        registry.clone(),
    )
    .with_discovery_index(Arc::new(BrokenIndex));

    let meta = importer
        .install_skill(source.to_str().unwrap(), None, None)
        .await
        .expect("Import must survive a discovery index failure");
    assert!(registry.skill_exists(&meta.id));
}

#[tokio::test]
async fn test_uninstall_removes_record_and_files() {
    let (config, registry, importer, temp) = test_env();
    let source = temp.path().join("src/short-lived");
    write_command_skill(&source, "Short Lived", "./run.sh");

    let meta = importer
        .install_skill(source.to_str().unwrap(), None, None)
        .await
        .unwrap();
    let install_dir = config.resolve_install_path(&meta.install_path);
    assert!(install_dir.is_dir());

    importer.uninstall_skill(&meta.id).await.unwrap();
    assert!(!registry.skill_exists(&meta.id));
    assert!(!install_dir.exists());
}
