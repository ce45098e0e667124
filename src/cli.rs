use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "odoo-task-sync")]
#[command(about = "Export and import Odoo project tasks as JSON and CSV", long_about = None)]
pub struct Cli {
    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// YAML file with fallback connection settings (url, db, user, password)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Odoo server URL (overrides ODOO_URL)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Database name (overrides ODOO_DB)
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Login (overrides ODOO_USER)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Log RPC calls
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the tasks of the matching project(s) to JSON and CSV
    Export(ExportArgs),

    /// Apply task updates and creations from a JSON file
    Import {
        /// Update file: a list of tasks or an object with a `tasks` list
        #[arg(short, long, default_value = "tasks_to_update.json")]
        input: PathBuf,

        /// Comma-separated fields the import may write
        #[arg(long, value_delimiter = ',')]
        allow: Vec<String>,

        /// Dry run - show what would be done without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the server version and the task fields it exposes
    Status {
        /// List every resolved field with its label
        #[arg(short = 'l', long)]
        long: bool,
    },
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("project").required(true).args(["project_name", "project_id"])))]
pub struct ExportArgs {
    /// Match projects whose name contains this text (case-insensitive)
    #[arg(long)]
    pub project_name: Option<String>,

    /// Match the project with this id
    #[arg(long)]
    pub project_id: Option<i64>,

    /// Comma-separated task fields to export (defaults to the built-in list)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// JSON output path
    #[arg(long, default_value = "tasks.json")]
    pub json: PathBuf,

    /// CSV output path
    #[arg(long, default_value = "tasks.csv")]
    pub csv: PathBuf,
}
