use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "tasksync")]
#[command(about = "Offline-first task list that syncs when the server is reachable")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new task
    #[command(alias = "new")]
    Add {
        /// Task title
        #[arg(required = true)]
        title: Vec<String>,
        /// Longer description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List tasks
    #[command(alias = "ls")]
    List {
        /// Only tasks that are pending or failed to sync (deleted ones included)
        #[arg(long)]
        needs_sync: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one task
    Show {
        /// Task ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change an existing task
    #[command(group(ArgGroup::new("state").args(["done", "undone"])))]
    Update {
        /// Task ID or unique ID prefix
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// Mark the task completed
        #[arg(long)]
        done: bool,
        /// Mark the task not completed
        #[arg(long)]
        undone: bool,
    },
    /// Delete an existing task
    #[command(alias = "rm")]
    Delete {
        /// Task ID or unique ID prefix
        id: String,
    },
    /// Push queued changes to the server
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
        /// Keep syncing until interrupted
        #[arg(long)]
        watch: bool,
        /// Seconds between cycles in watch mode
        #[arg(long, default_value = "30", value_name = "SECS")]
        interval: u64,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show pending count, last sync time, and server reachability
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List queue items that ran out of retries
    Failed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
