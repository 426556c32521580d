#![forbid(unsafe_code)]

mod commands;
mod config;

use config::{CliConfig, usage};
use ritual_storage::{LocalStore, SqliteLogStore};
use ritual_sync::{OnlineFlag, SyncConfig, SyncEngine, SystemClock};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_env("RITUAL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn open_engine(cfg: &CliConfig) -> Result<SyncEngine<SqliteLogStore>, Box<dyn std::error::Error>> {
    let local = LocalStore::open(&cfg.storage_dir)?;
    let remote = SqliteLogStore::open(&cfg.remote_dir)?;
    let config = SyncConfig {
        zone: cfg.zone,
        streak_lookback_days: cfg.lookback_days,
        ..SyncConfig::default()
    };
    Ok(SyncEngine::new(
        local,
        remote,
        Arc::new(OnlineFlag::new(!cfg.offline)),
        Arc::new(SystemClock),
        config,
    ))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::parse_args().unwrap_or_else(|e| {
        eprintln!("{e}\n\n{}", usage());
        std::process::exit(2);
    });
    init_logging();

    let engine = open_engine(&cfg)?;
    match commands::run(&engine, &cfg) {
        Ok(out) => {
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Err(err) => {
            let out = serde_json::json!({
                "error": { "code": err.code(), "message": err.to_string() }
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            std::process::exit(1);
        }
    }
}
