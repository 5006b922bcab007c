//! Notification CLI commands.

use clap::{Args, Subcommand};
use serde_json::json;

use super::CommandEnv;
use crate::output::print_json;
use recordkeep_core::{
    AlertScanner, NotificationService, SqliteNotificationRepository, SqliteRecordStore,
    SystemClock,
};

/// Arguments for notification commands
#[derive(Debug, Args)]
pub struct NotificationArgs {
    /// Notification subcommand
    #[command(subcommand)]
    pub command: NotificationCommand,
}

/// Notification subcommands
#[derive(Debug, Subcommand)]
pub enum NotificationCommand {
    /// Scan contracts and merge alerts into the notification store
    Scan {
        /// Days ahead to look; defaults to the configured lookahead
        #[arg(short, long)]
        lookahead_days: Option<u32>,
    },
    /// Show notifications and the unread count
    List,
    /// Mark one notification read
    Read {
        /// Notification id, e.g. contract_C-100
        id: String,
    },
    /// Mark every notification read
    ReadAll,
    /// Delete notifications missing from the latest scan
    RetireStale,
}

/// Execute notification commands
pub fn execute(args: &NotificationArgs, env: &CommandEnv) -> anyhow::Result<()> {
    let conn = env.open()?;
    let service = NotificationService::new(
        SqliteNotificationRepository::new(&conn),
        SystemClock,
        &env.config,
    );
    let reader = env.reader.as_str();

    match &args.command {
        NotificationCommand::Scan { lookahead_days } => {
            let scanner = AlertScanner::new(
                SqliteRecordStore::new(&conn),
                SystemClock,
                env.config.clone(),
            );
            let lookahead = lookahead_days.unwrap_or(env.config.lookahead_days);
            service.scan_and_reconcile(&scanner, lookahead, reader)?;
            print_json(&service.feed(reader)?)
        }
        NotificationCommand::List => print_json(&service.feed(reader)?),
        NotificationCommand::Read { id } => {
            service.mark_read(reader, id)?;
            print_json(&json!({ "id": id, "read": true }))
        }
        NotificationCommand::ReadAll => {
            let marked = service.mark_all_read(reader)?;
            print_json(&json!({ "marked": marked }))
        }
        NotificationCommand::RetireStale => {
            let retired = service.retire_stale()?;
            print_json(&json!({ "retired": retired }))
        }
    }
}
