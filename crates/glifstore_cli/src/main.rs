//! Operator CLI for a glif store database.
//!
//! # Responsibility
//! - Health probe for core crate linkage.
//! - Administrative maintenance that the web layer does not expose:
//!   stale-lock sweeps, tombstone listing, per-font status counts.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glifstore_core::{
    default_log_level, init_logging, open_db, Connection, GlifKind, GlifService, GlifStatus,
    StoreConfig,
};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// glifstore - maintenance commands for a glif store database
#[derive(Parser, Debug)]
#[command(name = "glifstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Write logs to this absolute directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print core linkage and version
    Ping,

    /// Force-release every lock older than the configured TTL
    UnlockStale {
        /// SQLite database file
        #[arg(long)]
        db: PathBuf,

        /// TOML store configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Restrict the sweep to one font
        #[arg(long)]
        font: Option<Uuid>,
    },

    /// List tombstones of one font, newest first
    Tombstones {
        #[arg(long)]
        db: PathBuf,

        #[arg(long)]
        font: Uuid,

        #[arg(long)]
        limit: Option<u32>,
    },

    /// Per-status counts of active glifs in one font
    StatusSummary {
        #[arg(long)]
        db: PathBuf,

        #[arg(long)]
        font: Uuid,
    },

    /// Export commit message for edits after a timestamp
    CommitMessage {
        #[arg(long)]
        db: PathBuf,

        #[arg(long)]
        font: Uuid,

        /// Epoch milliseconds
        #[arg(long, default_value_t = 0)]
        since: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        let log_dir = log_dir
            .to_str()
            .context("log directory must be valid UTF-8")?;
        init_logging(level, log_dir, true).context("failed to initialize logging")?;
    }

    match cli.command {
        Command::Ping => {
            println!("glifstore_core ping={}", glifstore_core::ping());
            println!("glifstore_core version={}", glifstore_core::core_version());
        }
        Command::UnlockStale { db, config, font } => {
            let config = load_config(config.as_deref())?;
            let mut conn = open(&db)?;
            let mut service = GlifService::new(&mut conn, &config);
            let swept = service.sweep_stale_locks(font)?;
            for key in &swept {
                println!("unlocked {key}");
            }
            println!("{} stale lock(s) released", swept.len());
        }
        Command::Tombstones { db, font, limit } => {
            let mut conn = open(&db)?;
            let service = GlifService::with_defaults(&mut conn);
            for tombstone in service.tombstones(font, limit)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    tombstone.deleted_at,
                    tombstone.glif_type.as_str(),
                    tombstone.deleted_by.as_deref().unwrap_or("-"),
                    tombstone.filepath
                );
            }
        }
        Command::StatusSummary { db, font } => {
            let mut conn = open(&db)?;
            let service = GlifService::with_defaults(&mut conn);
            let summary = service.status_summary(font)?;
            println!("{:<16}{:>8}", "status", "count");
            for status in GlifStatus::ALL {
                println!("{:<16}{:>8}", status.label(), summary.total(status));
            }
            for kind in GlifKind::ALL {
                println!("{:<16}{:>8}", kind.as_str(), summary.kind_total(kind));
            }
        }
        Command::CommitMessage { db, font, since } => {
            let mut conn = open(&db)?;
            let service = GlifService::with_defaults(&mut conn);
            println!("{}", service.commit_message(font, since)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<StoreConfig> {
    match path {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("failed to load config `{}`", path.display())),
        None => Ok(StoreConfig::default()),
    }
}

fn open(path: &Path) -> Result<Connection> {
    open_db(path).with_context(|| format!("failed to open database `{}`", path.display()))
}
