//! Skill Host - Entry Point
//!
//! Local driver for the skill registry and sandbox:
//! - install: fetch a skill repository and register it
//! - run: execute an installed skill with a JSON payload
//! - list / show: inspect the registry
//! - health / migrate: drift checks and lifecycle normalization
//! - history: read back the audit journal

use skillhost::{
    health_check, migrate_setup_statuses, Config, PostRunRecorder, RunStatus, SkillImporter,
    SkillRegistry, SkillRunner,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn print_help() {
    println!("Skill Host v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: skillhost <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  install <source>       Install a skill from a git URL or local directory");
    println!("      --name <name>      Override the manifest's skill name");
    println!("      --subpath <path>   Manifest location inside the repository");
    println!("  run <skill-id>         Run an installed skill");
    println!("      --payload <json>   Input payload (default: {{}})");
    println!("      --timeout <secs>   Override the skill's timeout");
    println!("      --user <id>        User id recorded with the run (default: cli)");
    println!("  list                   List installed skills");
    println!("  show <skill-id>        Print one skill's metadata");
    println!("  uninstall <skill-id>   Remove a skill and its install directory");
    println!("  health <skill-id>      Check installed files against the import checksum");
    println!("  migrate                Renormalize lifecycle states");
    println!("  history                Show recent runs from the audit journal");
    println!("      --limit <n>        Number of entries (default: 20)");
    println!();
    println!("Environment variables:");
    println!("  SKILLHOST_DATA_DIR          State root (registry, skills, logs, journal)");
    println!("  SKILLHOST_DEFAULT_TIMEOUT   Timeout floor in seconds (default: 300)");
    println!("  RUST_LOG                    Log level (error/warn/info/debug/trace)");
}

fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        })
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str);

    if matches!(command, None | Some("--help") | Some("-h")) {
        print_help();
        return Ok(());
    }

    let config = Config::from_env()?;
    let registry = Arc::new(SkillRegistry::open(&config)?);

    match command {
        Some("install") => {
            let source = args
                .get(1)
                .filter(|a| !a.starts_with("--"))
                .ok_or_else(|| anyhow::anyhow!("install requires a <source> argument"))?;
            let name = flag_value(&args, "--name");
            let subpath = flag_value(&args, "--subpath");

            let importer = SkillImporter::new(config.clone(), registry.clone());
            let meta = importer
                .install_skill(source, name.as_deref(), subpath.as_deref())
                .await?;
            println!(
                "Installed {} v{} ({}) from {}",
                meta.id,
                meta.version,
                meta.setup_status.as_str(),
                meta.source.repository
            );
        }
        Some("run") => {
            let skill_id = args
                .get(1)
                .filter(|a| !a.starts_with("--"))
                .ok_or_else(|| anyhow::anyhow!("run requires a <skill-id> argument"))?;
            let payload: serde_json::Value = match flag_value(&args, "--payload") {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("invalid --payload JSON: {}", e))?,
                None => serde_json::json!({}),
            };
            let timeout = flag_value(&args, "--timeout")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs);
            let user = flag_value(&args, "--user").unwrap_or_else(|| "cli".to_string());

            let runner = SkillRunner::new(config.clone(), registry.clone());
            let result = runner.run(skill_id, payload, &user, None, timeout).await?;

            let recorder = PostRunRecorder::new(config, registry, None);
            recorder.record(&result, &user, None).await;

            print!("{}", result.stdout);
            if !result.stderr.is_empty() {
                eprint!("{}", result.stderr);
            }
            eprintln!(
                "[{}] {} in {}ms (log: {})",
                result.status.as_str(),
                result.run_id,
                result.duration_ms,
                result.log_path.display()
            );
            if result.status == RunStatus::Failed {
                std::process::exit(1);
            }
        }
        Some("list") => {
            let skills = registry.list_skills();
            if skills.is_empty() {
                println!("No skills installed.");
            }
            for meta in skills {
                println!(
                    "{:<32} v{:<8} {:<20} {}",
                    meta.id,
                    meta.version,
                    meta.setup_status.as_str(),
                    meta.description
                );
            }
        }
        Some("show") => {
            let skill_id = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("show requires a <skill-id> argument"))?;
            let meta = registry
                .get_skill(skill_id)
                .ok_or_else(|| anyhow::anyhow!("skill not registered: {}", skill_id))?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        Some("uninstall") => {
            let skill_id = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("uninstall requires a <skill-id> argument"))?;
            let importer = SkillImporter::new(config, registry);
            let removed = importer.uninstall_skill(skill_id).await?;
            println!("Removed {}", removed.id);
        }
        Some("health") => {
            let skill_id = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("health requires a <skill-id> argument"))?;
            let report = health_check(&config, &registry, skill_id).await?;
            println!(
                "{}: {} ({})",
                report.skill_id,
                if report.healthy { "healthy" } else { "UNHEALTHY" },
                report.notes
            );
            if !report.healthy {
                std::process::exit(1);
            }
        }
        Some("migrate") => {
            let changed = migrate_setup_statuses(&registry)?;
            println!("Migrated {} skill(s)", changed);
        }
        Some("history") => {
            let limit = flag_value(&args, "--limit")
                .and_then(|v| v.parse().ok())
                .unwrap_or(20);
            let recorder = PostRunRecorder::new(config, registry, None);
            for entry in recorder.recent_entries(limit) {
                println!(
                    "{} {:<32} {:<8} {:>6}ms user={} log={}",
                    entry.ts.format("%Y-%m-%d %H:%M:%S"),
                    entry.skill_id,
                    entry.status.as_str(),
                    entry.duration_ms,
                    entry.user_id,
                    entry.log_path.display()
                );
            }
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Run 'skillhost --help' for usage.");
            std::process::exit(2);
        }
        None => unreachable!(),
    }

    Ok(())
}
