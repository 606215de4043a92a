//! CLI command definitions.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::pipeline::{Orchestrator, RunRequest};
use crate::server;
use crate::storage::{MemoryHistoryStore, PgHistoryStore};

/// Repository profiling pipeline gateway.
#[derive(Parser)]
#[command(name = "metriccull")]
#[command(about = "Clone, provision, measure and analyse Python repositories")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway.
    Serve(ServeArgs),

    /// Profile one repository locally and print the result as JSON.
    Profile(ProfileArgs),
}

/// Arguments for the `serve` command.
#[derive(clap::Args)]
pub struct ServeArgs {
    /// Bind address, overriding BIND_ADDR.
    #[arg(long)]
    pub bind: Option<String>,
}

/// Arguments for the `profile` command.
#[derive(clap::Args)]
pub struct ProfileArgs {
    /// Clonable repository reference.
    pub repo_url: String,
}

/// Parses command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Runs the command selected by the parsed CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Profile(args) => profile(args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        warn!("No .env file found, using system env");
    }

    let mut config = ServiceConfig::from_env().context("invalid configuration")?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let store = PgHistoryStore::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    store
        .run_migrations()
        .await
        .context("failed to run migrations")?;
    info!("Database ready");

    server::serve(config, Arc::new(store)).await
}

async fn profile(args: ProfileArgs) -> anyhow::Result<()> {
    // One-shot mode needs no database; the synchronous flow never persists.
    let config = ServiceConfig::default().with_database_url("unused");
    let orchestrator = Orchestrator::new(config, Arc::new(MemoryHistoryStore::new()));

    let request = RunRequest::new(args.repo_url);
    let outcome = orchestrator.run_sync(&request).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
