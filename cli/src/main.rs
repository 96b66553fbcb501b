//! roundindex CLI: run the SmartBlox indexer and manage its checkpoint.
//!
//! Usage:
//! ```bash
//! SMARTBLOX_URL=http://localhost:8080 roundindex run
//! roundindex status
//! roundindex reset
//! roundindex info
//! ```
//!
//! All settings come from the environment, see [`config::AppConfig`].

mod config;
mod logging;

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use roundindex_core::checkpoint::{CheckpointManager, CheckpointStore};
use roundindex_smartblox::{ClientConfig, IndexerBuilder, SmartBloxClient};
use roundindex_storage::sqlite::SqliteStorage;

use crate::config::AppConfig;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("run");

    let result = match command {
        "run" => cmd_run().await,
        "status" => cmd_status().await,
        "reset" => cmd_reset().await,
        "info" => {
            cmd_info();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("roundindex {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("roundindex {}", env!("CARGO_PKG_VERSION"));
    println!("Crash-resumable transaction indexer for SmartBlox ledgers\n");
    println!("USAGE:");
    println!("    roundindex [COMMAND]\n");
    println!("COMMANDS:");
    println!("    run      Backfill, then follow the ledger until SIGINT/SIGTERM (default)");
    println!("    status   Show the persisted checkpoint");
    println!("    reset    Delete the persisted checkpoint");
    println!("    info     Show the effective configuration");
    println!("    version  Print version");
    println!("    help     Print this help\n");
    println!("ENVIRONMENT:");
    println!("    SMARTBLOX_URL     Ledger node base URL   [default: {}]", config::DEFAULT_SMARTBLOX_URL);
    println!("    DATABASE_PATH     SQLite database file   [default: {}]", config::DEFAULT_DATABASE_PATH);
    println!("    TX_TYPE           Qualifying kind        [default: txfer]");
    println!("    POLL_INTERVAL_MS  Live poll period       [default: 5000]");
    println!("    PERSIST_INTERVAL  Save every N rounds    [default: 10]");
    println!("    INDEXER_ID        Checkpoint key         [default: singleton_metrics_state]");
    println!("    LOG_LEVEL         Tracing filter         [default: info]");
    println!("    LOG_JSON          JSON log lines         [default: false]");
}

async fn cmd_run() -> Result<()> {
    let cfg = AppConfig::from_env()?;
    logging::init_tracing(&cfg.log)?;

    tracing::info!(
        url = %cfg.smartblox_url,
        db = %cfg.database_path,
        indexer = %cfg.indexer.id,
        kind = %cfg.indexer.qualifying_kind,
        "Starting roundindex"
    );

    let storage = Arc::new(open_storage(&cfg).await?);
    let result = run_indexer(cfg, storage.clone()).await;
    storage.close().await;
    tracing::info!("Storage closed");
    result
}

async fn run_indexer(cfg: AppConfig, storage: Arc<SqliteStorage>) -> Result<()> {
    let client = SmartBloxClient::new(&cfg.smartblox_url, ClientConfig::default())?;

    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(token.clone()));

    let mut index_loop = IndexerBuilder::from_config(cfg.indexer)
        .build(client, storage.clone(), storage)?
        .with_cancellation(token);

    index_loop.run().await.context("indexer stopped with an error")?;

    let cp = index_loop.checkpoint();
    tracing::info!(
        round = cp.last_processed_round,
        txn_count = cp.txn_count,
        total_amount = cp.total_amount,
        "Shutdown complete"
    );
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let cfg = AppConfig::from_env()?;
    let storage = Arc::new(open_storage(&cfg).await?);
    let result = print_status(&cfg, &storage).await;
    storage.close().await;
    result
}

async fn print_status(cfg: &AppConfig, storage: &Arc<SqliteStorage>) -> Result<()> {
    let manager = CheckpointManager::new(storage.clone(), &cfg.indexer.id, cfg.indexer.persist_cadence);
    let Some(cp) = manager.load().await? else {
        println!("No checkpoint for indexer '{}'", cfg.indexer.id);
        return Ok(());
    };

    println!("Indexer:              {}", cfg.indexer.id);
    println!("Last processed round: {}", cp.last_processed_round);
    println!("Transactions:         {}", cp.txn_count);
    println!("Total amount:         {}", cp.total_amount);
    match (cp.min(), cp.max()) {
        (Some(min), Some(max)) => {
            println!("Min amount:           {} (round {})", min.amount, min.round);
            println!("Max amount:           {} (round {})", max.amount, max.round);
        }
        _ => println!("Min/max amount:       n/a"),
    }
    if let Some(ts) = storage.checkpoint_updated_at(&cfg.indexer.id).await? {
        println!("Updated at (unix):    {ts}");
    }
    println!("Logged transactions:  {}", storage.transaction_count().await?);
    Ok(())
}

async fn cmd_reset() -> Result<()> {
    let cfg = AppConfig::from_env()?;
    let storage = open_storage(&cfg).await?;
    let result = storage.delete(&cfg.indexer.id).await;
    storage.close().await;

    result?;
    println!("Checkpoint for indexer '{}' deleted", cfg.indexer.id);
    Ok(())
}

async fn open_storage(cfg: &AppConfig) -> Result<SqliteStorage> {
    SqliteStorage::open(&cfg.database_path)
        .await
        .with_context(|| format!("opening database {}", cfg.database_path))
}

fn cmd_info() {
    println!("roundindex v{}", env!("CARGO_PKG_VERSION"));
    match AppConfig::from_env() {
        Ok(cfg) => {
            println!("  Ledger node:          {}", cfg.smartblox_url);
            println!("  Database:             {}", cfg.database_path);
            println!("  Indexer id:           {}", cfg.indexer.id);
            println!("  Qualifying kind:      {}", cfg.indexer.qualifying_kind);
            println!("  Poll interval:        {} ms", cfg.indexer.poll_interval_ms);
            println!("  Checkpoint interval:  every {} rounds", cfg.indexer.persist_cadence);
            println!("  Log level:            {} (json: {})", cfg.log.level, cfg.log.json);
        }
        Err(e) => println!("  Configuration error:  {e:#}"),
    }
    println!("  Storage backends: memory, SQLite");
}

/// Cancel `token` on SIGINT, or SIGTERM on unix.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
    token.cancel();
}
