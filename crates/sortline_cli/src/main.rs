//! Command-line entry point over the sort-key engine and SQLite store.
//!
//! # Responsibility
//! - Expose allocation and renormalization for quick what-if checks.
//! - Run a small end-to-end ordering session against a store.

use clap::{Parser, Subcommand};
use sortline_core::db::{open_db, open_db_in_memory};
use sortline_core::key::sort_siblings;
use sortline_core::{
    default_log_level, init_logging, load_config, renormalize, ContainerKind, KeySpace,
    KeySpaceConfig, OrderingService, Placement, SiblingKey, SqliteItemRepository,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "sortline",
    version = sortline_core::core_version(),
    about = "Positional sort keys for ordered board items",
    disable_help_subcommand = true
)]
struct Cli {
    /// JSON file with `default_gap`, `renorm_gap` and `min_gap` overrides.
    #[arg(long, global = true, env = "SORTLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, global = true, env = "SORTLINE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "trace|debug|info|warn|error")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Allocate keys between two neighbors (omit one for head/tail).
    Allocate {
        #[arg(long, allow_hyphen_values = true)]
        prev: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        next: Option<f64>,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Print evenly spaced replacement keys for a list of keys.
    Renormalize {
        #[arg(required = true, allow_hyphen_values = true)]
        keys: Vec<f64>,
    },
    /// Build a checklist on a card, reorder it, and print the listing.
    Demo {
        /// SQLite file to use; an in-memory store when unset.
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

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

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or_else(|| default_log_level());
        init_logging(level, log_dir)?;
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => KeySpaceConfig::default(),
    };
    let space = KeySpace::new(config)?;

    match cli.command {
        Command::Allocate { prev, next, count } => {
            for key in space.allocate(prev, next, count)? {
                println!("{key}");
            }
        }
        Command::Renormalize { keys } => {
            for line in renormalize_lines(&space, &keys) {
                println!("{line}");
            }
        }
        Command::Demo { db } => {
            let conn = match db {
                Some(path) => open_db(path)?,
                None => open_db_in_memory()?,
            };
            let service = OrderingService::new(SqliteItemRepository::try_new(&conn)?, space);
            for line in run_demo(&service)? {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn renormalize_lines(space: &KeySpace, keys: &[f64]) -> Vec<String> {
    let mut siblings: Vec<_> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| SiblingKey::new(Uuid::from_u128(i as u128), *key))
        .collect();
    sort_siblings(&mut siblings);

    renormalize(space, &siblings)
        .iter()
        .zip(&siblings)
        .map(|(assignment, sibling)| format!("{} -> {}", sibling.key, assignment.key))
        .collect()
}

fn run_demo(
    service: &OrderingService<SqliteItemRepository<'_>>,
) -> Result<Vec<String>, Box<dyn Error>> {
    let card = service.create_container(ContainerKind::Card, "Launch")?;
    let checklist =
        service.insert_container(card.uuid, ContainerKind::Checklist, "Release", Placement::Tail)?;
    let items = service.append_text(checklist.uuid, "Draft notes\nReview\nShip", true)?;
    if let Some(last) = items.last() {
        service.reorder_item(last.uuid, Placement::Head)?;
    }

    Ok(service
        .list_items(checklist.uuid)?
        .into_iter()
        .map(|item| format!("{}\t{}", item.sort_key, item.title))
        .collect())
}
