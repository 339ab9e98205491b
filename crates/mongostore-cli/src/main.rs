//! mstore - command-line client for mongostore
//!
//! Usage:
//!   mstore ping                                 Check that a server answers
//!   mstore databases                            List databases
//!   mstore collections                          List collections of the database
//!   mstore version                              Print the server version
//!   mstore find users --filter '{"age": {"$gt": 30}}' --limit 10
//!   mstore find-id users 507f1f77bcf86cd799439011
//!   mstore count users --filter '{"active": true}'
//!   mstore insert users '{"name": "alice"}'
//!   mstore update-id users <id> '{"age": 31}'
//!   mstore delete-id users <id>
//!   mstore aggregate users '[{"$group": {"_id": "$age", "n": {"$sum": 1}}}]'
//!
//! Options come from `--config`, `./mstore.toml`, or `MONGOSTORE_*` variables.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mongostore::Store;
use std::path::PathBuf;

mod commands;
mod config;

#[derive(Parser, Debug)]
#[command(name = "mstore")]
#[command(about = "Query MongoDB through mongostore conventions", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database to use instead of the configured default
    #[arg(short, long, global = true)]
    db: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that a server answers
    Ping,
    /// List database names
    Databases,
    /// List collection names of the selected database
    Collections,
    /// Print the server version
    Version,
    /// Find documents
    Find {
        collection: String,
        /// Filter as extended JSON
        #[arg(short, long)]
        filter: Option<String>,
        /// Sort specification as extended JSON
        #[arg(short, long)]
        sort: Option<String>,
        #[arg(short, long)]
        limit: Option<i64>,
        #[arg(long)]
        skip: Option<u64>,
    },
    /// Find one document by id
    FindId { collection: String, id: String },
    /// Count documents
    Count {
        collection: String,
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Insert a document, or every document of a JSON array
    Insert { collection: String, document: String },
    /// `$set` fields on the document with the given id
    UpdateId {
        collection: String,
        id: String,
        update: String,
    },
    /// Delete the document with the given id
    DeleteId { collection: String, id: String },
    /// Run an aggregation pipeline given as a JSON array
    Aggregate { collection: String, pipeline: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = std::env::current_dir().context("Cannot determine working directory")?;
    let options = config::resolve_options(cli.config.as_deref(), &cwd)?;

    let store = Store::connect(options).await?;
    let store = match &cli.db {
        Some(db) => store.with_database(db)?,
        None => store,
    };

    let output = commands::run(&store, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Initialize logging; RUST_LOG overrides the verbosity flag
fn init_logging(verbose: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = match verbose {
        0 => "warn",
        1 => "mongostore=debug,info",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok(); // Ignore error if already initialized
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_find() {
        let cli = Cli::parse_from([
            "mstore", "--db", "app", "find", "users", "--filter", "{}", "--limit", "5",
        ]);
        assert_eq!(cli.db.as_deref(), Some("app"));
        match cli.command {
            Command::Find {
                collection, limit, ..
            } => {
                assert_eq!(collection, "users");
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_verbose_after_subcommand() {
        let cli = Cli::parse_from(["mstore", "ping", "-vv"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Ping));
    }
}
