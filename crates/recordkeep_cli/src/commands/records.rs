//! Live record CLI commands.

use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use serde_json::json;

use super::CommandEnv;
use crate::output::print_json;
use recordkeep_core::{RecordPayload, RecordStore, SqliteRecordStore};

/// Arguments for record commands
#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Record subcommand
    #[command(subcommand)]
    pub command: RecordCommand,
}

/// Record subcommands
#[derive(Debug, Subcommand)]
pub enum RecordCommand {
    /// Insert a record; fails when the id is taken
    Put {
        /// Collection name
        collection: String,
        /// Record id
        id: String,
        /// JSON object payload
        payload: String,
    },
    /// Show one record
    Get {
        /// Collection name
        collection: String,
        /// Record id
        id: String,
    },
    /// List a collection
    List {
        /// Collection name
        collection: String,
    },
}

/// Execute record commands
pub fn execute(args: &RecordArgs, env: &CommandEnv) -> anyhow::Result<()> {
    let conn = env.open()?;
    let store = SqliteRecordStore::new(&conn);

    match &args.command {
        RecordCommand::Put {
            collection,
            id,
            payload,
        } => {
            let payload: RecordPayload =
                serde_json::from_str(payload).context("payload must be a JSON object")?;
            store.insert_record(collection, id, &payload)?;
            print_json(&json!({ "collection": collection, "record_id": id }))
        }
        RecordCommand::Get { collection, id } => match store.get_record(collection, id)? {
            Some(payload) => print_json(&payload),
            None => bail!("record `{id}` not found in `{collection}`"),
        },
        RecordCommand::List { collection } => print_json(&store.list_records(collection)?),
    }
}
