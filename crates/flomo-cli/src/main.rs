//! flomo CLI - offline mirror of flomo memos
//!
//! Sync once, then list, search and export from the local store.

mod cli;
mod commands;
mod config;
mod error;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::export::{run_export, ExportArgs};
use crate::commands::list::run_list;
use crate::commands::search::run_search;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::config::{CliConfig, Settings};
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

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("flomo=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { token, show }) => {
            run_config(token.as_deref(), show, cli.db_path)?;
        }
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        Some(command) => {
            let config = CliConfig::load()?;
            let settings = Settings::resolve(cli.db_path, &config);
            run_store_command(command, &settings).await?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}

async fn run_store_command(command: Commands, settings: &Settings) -> Result<(), CliError> {
    match command {
        Commands::Sync { incremental } => run_sync(incremental, settings).await,
        Commands::Status { json } => run_status(json, settings).await,
        Commands::List { page, json } => run_list(page, json, settings).await,
        Commands::Search { query, page, json } => run_search(&query, page, json, settings).await,
        Commands::Export {
            format,
            compact,
            no_meta,
            min,
            url,
            order_by,
            order_dir,
            limit,
            output,
        } => {
            let args = ExportArgs {
                format,
                compact,
                no_meta,
                min,
                url,
                order_by,
                order_dir,
                limit,
                output,
            };
            run_export(args, settings).await
        }
        Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
    }
}
