//! CLI command definitions and dispatch.

pub mod notifications;
pub mod records;
pub mod run;
pub mod trash;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use recordkeep_core::{
    default_log_level, init_logging, init_stderr_logging, open_db, EngineConfig,
};
use rusqlite::Connection;
use std::path::PathBuf;

/// Soft-delete trash and contract expiry notifications
#[derive(Debug, Parser)]
#[command(name = "recordkeep", version, about, long_about = None)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = "recordkeep.db")]
    pub db: PathBuf,

    /// TOML config file; defaults apply when it does not exist
    #[arg(short, long, global = true, default_value = "recordkeep.toml")]
    pub config: PathBuf,

    /// Absolute directory for rotating log files; logs go to stderr otherwise
    #[arg(long, global = true)]
    pub log_dir: Option<String>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Reader whose notification read state is shown and changed
    #[arg(long, global = true, default_value = "default")]
    pub reader: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Trash lifecycle: move, restore, purge, list, sweep
    Trash(trash::TrashArgs),
    /// Contract expiry notifications
    Notifications(notifications::NotificationArgs),
    /// Live record access
    Records(records::RecordArgs),
    /// Run the retention sweeper and alert scanner until Ctrl-C
    Run(run::RunArgs),
}

/// Resolved settings shared by every command.
pub struct CommandEnv {
    pub db_path: PathBuf,
    pub config: EngineConfig,
    pub reader: String,
}

impl CommandEnv {
    pub fn open(&self) -> anyhow::Result<Connection> {
        open_db(&self.db_path)
            .with_context(|| format!("failed to open database `{}`", self.db_path.display()))
    }
}

impl Cli {
    pub async fn execute(self) -> anyhow::Result<()> {
        self.start_logging()?;

        let config = EngineConfig::load(&self.config)
            .with_context(|| format!("failed to load config `{}`", self.config.display()))?;
        let env = CommandEnv {
            db_path: self.db,
            config,
            reader: self.reader,
        };

        match self.command {
            Commands::Trash(args) => trash::execute(&args, &env),
            Commands::Notifications(args) => notifications::execute(&args, &env),
            Commands::Records(args) => records::execute(&args, &env),
            Commands::Run(args) => run::execute(&args, &env).await,
        }
    }

    fn start_logging(&self) -> anyhow::Result<()> {
        let result = match &self.log_dir {
            Some(dir) => {
                let level = self.log_level.as_deref().unwrap_or(default_log_level());
                init_logging(level, dir)
            }
            None => init_stderr_logging(self.log_level.as_deref().unwrap_or("warn")),
        };
        result.map_err(|message| anyhow!(message))
    }
}
