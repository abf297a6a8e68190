use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use company_sync::logging::{init_tracing, DEFAULT_FILTER};
use company_sync::{CompanyUpdate, Config, SyncOrchestrator};

/// Register companies by CVR number and keep them in sync with the registry
#[derive(Parser)]
#[command(name = "company-sync", version, about)]
struct Cli {
    /// SQLite database file (overrides COMPANY_DB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Never answer from the curated fallback dataset
    #[arg(long, global = true)]
    no_fallback: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a company and enrich it from the registry
    Create {
        registry_number: String,
        /// Store the bare record only
        #[arg(long)]
        no_sync: bool,
    },
    /// List companies, newest first
    List,
    /// Show one company
    Show { id: String },
    /// Edit fields by hand (only the given ones change)
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Delete a company and its sync history
    Delete { id: String },
    /// Refresh a company from the registry
    Sync { id: String },
    /// Show sync attempts for a company, newest first
    History { id: String },
    /// Query the registry without storing anything
    Lookup { registry_number: String },
}

fn main() -> Result<ExitCode> {
    init_tracing(DEFAULT_FILTER)?;
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    if cli.no_fallback {
        config.registry.fallback_enabled = false;
    }
    if let Command::Create { no_sync: true, .. } = cli.command {
        config.sync_on_create = false;
    }

    ensure_parent_dir(&config.database_path)?;
    let orchestrator = SyncOrchestrator::from_config(&config)?;

    run(&orchestrator, cli.command)
}

fn run(orchestrator: &SyncOrchestrator, command: Command) -> Result<ExitCode> {
    match command {
        Command::Create { registry_number, .. } => {
            let outcome = orchestrator.create_from_registry_number(&registry_number)?;
            print_json(&outcome)?;
        }
        Command::List => print_json(&orchestrator.list()?)?,
        Command::Show { id } => print_json(&orchestrator.get(&id)?)?,
        Command::Update {
            id,
            name,
            phone,
            email,
            address,
        } => {
            let fields = CompanyUpdate {
                name,
                phone,
                email,
                address,
            };
            print_json(&orchestrator.update(&id, &fields)?)?;
        }
        Command::Delete { id } => {
            orchestrator.delete(&id)?;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
        Command::Sync { id } => {
            let outcome = orchestrator.sync_company(&id)?;
            print_json(&outcome)?;
            if !outcome.succeeded {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::History { id } => print_json(&orchestrator.sync_history(&id)?)?,
        Command::Lookup { registry_number } => {
            print_json(&orchestrator.lookup(&registry_number)?)?
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display())),
        _ => Ok(()),
    }
}
