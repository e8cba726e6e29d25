//! tasksync CLI - offline-first task list from the command line
//!
//! Every change is recorded locally and queued; `tasksync sync` pushes the
//! queue to the server whenever it is reachable.

mod cli;
mod commands;
mod error;

use std::time::Duration;

use clap::Parser;

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::add::run_add;
use crate::commands::common::{load_sync_settings, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::show::run_show;
use crate::commands::sync::{run_sync, run_sync_conflicts, run_sync_failed, run_sync_status};
use crate::commands::update::{run_update, UpdateArgs};
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

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tasksync=info".parse().expect("static directive"))
                .add_directive("tasksync_core=warn".parse().expect("static directive")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Add { title, description } => {
            run_add(&title, description, &db_path).await?;
        }
        Commands::List { needs_sync, json } => run_list(needs_sync, json, &db_path).await?,
        Commands::Show { id, json } => run_show(&id, json, &db_path).await?,
        Commands::Update {
            id,
            title,
            description,
            done,
            undone,
        } => {
            let args = UpdateArgs {
                title,
                description,
                done,
                undone,
            };
            run_update(&id, args, &db_path).await?;
        }
        Commands::Delete { id } => run_delete(&id, &db_path).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
        Commands::Sync {
            command,
            watch,
            interval,
        } => {
            let settings = load_sync_settings()?;
            match command {
                None => {
                    let watch = watch.then(|| Duration::from_secs(interval.max(1)));
                    run_sync(settings, watch, &db_path).await?;
                }
                Some(SyncCommands::Status { json }) => {
                    run_sync_status(settings, json, &db_path).await?;
                }
                Some(SyncCommands::Conflicts { limit, json }) => {
                    run_sync_conflicts(limit, json, &db_path).await?;
                }
                Some(SyncCommands::Failed { json }) => {
                    run_sync_failed(&settings, json, &db_path).await?;
                }
            }
        }
    }

    Ok(())
}
