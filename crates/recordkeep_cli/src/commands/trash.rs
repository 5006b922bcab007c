//! Trash CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::json;

use super::CommandEnv;
use crate::output::print_json;
use recordkeep_core::{
    EntityType, PurgeOutcome, RetentionSweeper, SqliteTrashRepository, SweepReport, SystemClock,
    TrashEntryId, TrashListQuery, TrashService,
};

/// Arguments for trash commands
#[derive(Debug, Args)]
pub struct TrashArgs {
    /// Trash subcommand
    #[command(subcommand)]
    pub command: TrashCommand,
}

/// Trash subcommands
#[derive(Debug, Subcommand)]
pub enum TrashCommand {
    /// Move a live record into the trash
    Move {
        /// Entity type tag (company, contract, process, document, ...)
        #[arg(short, long)]
        entity_type: String,
        /// Collection holding the record
        #[arg(long)]
        collection: String,
        /// Record id inside the collection
        #[arg(short, long)]
        id: String,
        /// Who is deleting
        #[arg(short, long)]
        actor: String,
    },
    /// Put a trashed record back into its collection
    Restore {
        /// Trash entry id
        entry_id: TrashEntryId,
    },
    /// Permanently delete a trash entry
    Purge {
        /// Trash entry id
        entry_id: TrashEntryId,
    },
    /// List trash entries, newest deletion first
    List {
        /// Filter by entity type
        #[arg(short, long)]
        entity_type: Option<String>,
        /// Case-insensitive text matched against label and record id
        #[arg(short, long)]
        search: Option<String>,
        /// Maximum entries to return
        #[arg(short, long)]
        limit: Option<u32>,
        /// Entries to skip
        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Purge every expired entry now
    Sweep,
}

#[derive(Debug, Serialize)]
struct PurgeOutput {
    entry_id: TrashEntryId,
    outcome: PurgeOutcome,
}

/// Execute trash commands
pub fn execute(args: &TrashArgs, env: &CommandEnv) -> anyhow::Result<()> {
    let conn = env.open()?;
    let service = TrashService::new(SqliteTrashRepository::new(&conn), SystemClock, &env.config);

    match &args.command {
        TrashCommand::Move {
            entity_type,
            collection,
            id,
            actor,
        } => {
            let entry =
                service.move_to_trash(EntityType::parse(entity_type), collection, id, actor)?;
            print_json(&entry)
        }
        TrashCommand::Restore { entry_id } => {
            let entry = service.restore(*entry_id)?;
            print_json(&json!({
                "entry_id": entry.id,
                "collection": entry.snapshot.origin_collection,
                "record_id": entry.snapshot.record_id,
            }))
        }
        TrashCommand::Purge { entry_id } => {
            let outcome = service.purge(*entry_id)?;
            print_json(&PurgeOutput {
                entry_id: *entry_id,
                outcome,
            })
        }
        TrashCommand::List {
            entity_type,
            search,
            limit,
            offset,
        } => {
            let query = TrashListQuery {
                entity_type: entity_type.as_deref().map(EntityType::parse),
                search_text: search.clone(),
                limit: *limit,
                offset: *offset,
            };
            print_json(&service.list_summaries(&query)?)
        }
        TrashCommand::Sweep => {
            let sweeper = RetentionSweeper::new(SqliteTrashRepository::new(&conn), SystemClock);
            report_sweep(sweeper.sweep_expired()?)
        }
    }
}

/// Prints the sweep totals, then fails when any expired entry survived.
fn report_sweep(report: SweepReport) -> anyhow::Result<()> {
    let failed: Vec<String> = report
        .failed
        .iter()
        .map(|(id, err)| format!("{id}: {err}"))
        .collect();
    print_json(&json!({
        "examined": report.examined,
        "purged": report.purged,
        "already_gone": report.already_gone,
        "failed": failed,
    }))?;
    report.into_result()?;
    Ok(())
}
