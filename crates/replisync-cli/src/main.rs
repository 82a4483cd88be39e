//! # replisync CLI
//!
//! Runs synchronization cycles between two `SQLite` replicas and inspects
//! checkpoint state. Checkpoints live alongside the records in the local
//! replica's database file.

use anyhow::{Context, Result};
use replisync_core::{CheckpointStore, SyncMode};
use replisync_engine::{SyncEngine, SyncOptions, SyncReport};
use replisync_store_sqlite::{SqliteCheckpointStore, SqliteRepository};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "sync" => {
            if args.len() < 4 {
                eprintln!("Usage: replisync sync <local.db> <remote.db> [OPTIONS]");
                std::process::exit(1);
            }
            run_sync(&args[2], &args[3], &args[4..]).await?;
        }
        "checkpoint" => {
            if args.len() < 4 {
                eprintln!("Usage: replisync checkpoint <local.db> <entity-type>");
                std::process::exit(1);
            }
            show_checkpoint(&args[2], &args[3]).await?;
        }
        "help" | "--help" | "-h" => {
            print_help();
        }
        cmd => {
            eprintln!("Unknown command: {cmd}");
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn run_sync(local_path: &str, remote_path: &str, flags: &[String]) -> Result<()> {
    let mut options = SyncOptions::from_env()?;
    let mut entity_type = String::from("record");

    let mut iter = flags.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--two-way" => options.mode = SyncMode::TwoWay,
            "--auto-resolve" => options.auto_resolve = true,
            "--entity-type" => {
                entity_type = iter
                    .next()
                    .context("--entity-type requires a value")?
                    .clone();
            }
            other => {
                eprintln!("Unknown flag: {other}");
                std::process::exit(1);
            }
        }
    }

    let local = SqliteRepository::open(Path::new(local_path))
        .with_context(|| format!("Failed to open local replica {local_path}"))?;
    let remote = SqliteRepository::open(Path::new(remote_path))
        .with_context(|| format!("Failed to open remote replica {remote_path}"))?;
    let checkpoints = SqliteCheckpointStore::open(Path::new(local_path))
        .with_context(|| format!("Failed to open checkpoint store in {local_path}"))?;

    let engine = SyncEngine::new(entity_type, local, remote, checkpoints, options);

    match engine.run_cycle().await? {
        SyncReport::Completed {
            actions_applied,
            watermark,
        } => {
            println!("Cycle completed: {actions_applied} action(s) applied");
            match watermark {
                Some(watermark) => println!("Watermark advanced to {watermark}"),
                None => println!("No changes observed; watermark unchanged"),
            }
        }
        SyncReport::Conflicted { conflicts } => {
            println!("Cycle stopped: {} unresolved conflict(s)", conflicts.len());
            for conflict in &conflicts {
                println!(
                    "  record {}: client wrote at {}, server wrote at {}",
                    conflict.expected.id, conflict.expected.updated_at, conflict.actual.updated_at,
                );
            }
            println!("Re-run with --auto-resolve to settle by last writer wins");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn show_checkpoint(db_path: &str, entity_type: &str) -> Result<()> {
    let store = SqliteCheckpointStore::open(Path::new(db_path))
        .with_context(|| format!("Failed to open checkpoint store in {db_path}"))?;

    match store.load(entity_type).await? {
        Some(watermark) => println!("{entity_type}: {watermark}"),
        None => println!("{entity_type}: no checkpoint recorded"),
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"replisync

USAGE:
    replisync <COMMAND> [OPTIONS]

COMMANDS:
    sync <local.db> <remote.db>   Run one synchronization cycle
        --entity-type <name>      Entity type to checkpoint under (default: record)
        --two-way                 Propagate changes in both directions
        --auto-resolve            Settle conflicts by last writer wins
    checkpoint <local.db> <type>  Show the stored watermark for an entity type
    help                          Show this help message

ENVIRONMENT:
    REPLISYNC_MODE                "one-way" or "two-way"
    REPLISYNC_AUTO_RESOLVE        "true" or "false"
    REPLISYNC_RESOLVE_POLICY      "prefer-incoming", "prefer-stored", or "manual"

EXAMPLES:
    replisync sync local.db remote.db --two-way
    replisync checkpoint local.db record
"#
    );
}
