//! `lifetrack` command-line entry point.
//!
//! # Responsibility
//! - Probe core linkage (`ping`, `version`).
//! - Inspect, back up, restore and reset a database file.

use clap::{Parser, Subcommand};
use lifetrack_core::{
    core_version, init_logging, open_store, ping, EventBus, StoreName, DB_VERSION,
};
use log::info;
use serde_json::Value;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lifetrack", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Write rolling logs to this absolute directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level used with --log-dir
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the core library is linked
    Ping,
    /// Print the core library version
    Version,
    /// Print record counts per store
    Stats {
        #[arg(long)]
        db: PathBuf,
    },
    /// Write a JSON backup to a file or stdout
    Export {
        #[arg(long)]
        db: PathBuf,
        /// Export only this store
        #[arg(long)]
        store: Option<StoreName>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Append the records of a JSON backup
    Import {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete every record of one store or of all stores
    Reset {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        store: Option<StoreName>,
    },
    /// Read a setting, or write it when a JSON value is given
    Setting {
        #[arg(long)]
        db: PathBuf,
        key: String,
        value: Option<String>,
    },
}

type CliResult = Result<(), Box<dyn Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult {
    if let Some(log_dir) = &cli.log_dir {
        init_logging(&cli.log_level, log_dir)?;
    }

    match cli.command {
        Command::Ping => println!("lifetrack_core ping={}", ping()),
        Command::Version => println!("lifetrack_core version={}", core_version()),
        Command::Stats { db } => {
            let store = open_store(&db, DB_VERSION, Arc::new(EventBus::new()))?;
            for name in StoreName::ALL {
                println!("{name}\t{}", store.count(name)?);
            }
            println!("total\t{}", store.count_all()?);
        }
        Command::Export { db, store, out } => {
            let json = open_store(&db, DB_VERSION, Arc::new(EventBus::new()))?.export_json(store)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    info!("event=cli_export module=cli status=ok");
                }
                None => println!("{json}"),
            }
        }
        Command::Import { db, file } => {
            let json = std::fs::read_to_string(&file)?;
            let summary =
                open_store(&db, DB_VERSION, Arc::new(EventBus::new()))?.import_json(&json)?;
            println!("imported {} records", summary.imported);
            for skipped in summary.skipped_stores {
                println!("skipped unknown store `{skipped}`");
            }
        }
        Command::Reset { db, store } => {
            let removed = open_store(&db, DB_VERSION, Arc::new(EventBus::new()))?.clear(store)?;
            println!("removed {removed} records");
        }
        Command::Setting { db, key, value } => {
            let store = open_store(&db, DB_VERSION, Arc::new(EventBus::new()))?;
            match value {
                Some(raw) => {
                    let parsed = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                    store.save_setting(&key, parsed)?;
                }
                None => println!("{}", store.get_setting(&key, Value::Null)?),
            }
        }
    }
    Ok(())
}
