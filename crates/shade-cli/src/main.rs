//! Shade CLI - manage colour swatches from the terminal
//!
//! Reads work against the local cache; writes go through the sync engine.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{load_config, resolve_db_path};
use crate::commands::delete::run_delete;
use crate::commands::export::run_export;
use crate::commands::list::run_list;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "shade=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let db_path = resolve_db_path(cli.db_path, &config)?;

    match cli.command {
        Commands::List { search, sort, json } => {
            run_list(search.as_deref(), sort.into(), json, &db_path).await?;
        }
        Commands::Export { format, output } => {
            run_export(format, output.as_deref(), &db_path).await?;
        }
        Commands::Add { random, values } => run_add(random, &values, &config, &db_path).await?,
        Commands::Delete { id } => run_delete(&id, &config, &db_path).await?,
        Commands::Watch => run_watch(&config, &db_path).await?,
    }

    Ok(())
}
