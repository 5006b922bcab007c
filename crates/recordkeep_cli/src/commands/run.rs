//! Foreground runner for the background tasks.

use anyhow::Context;
use clap::Args;
use log::info;
use std::sync::Arc;

use super::CommandEnv;
use recordkeep_core::{BackgroundTasks, SystemClock};

/// Arguments for the run command
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Override the configured sweep interval (seconds)
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,
    /// Override the configured scan interval (seconds)
    #[arg(long)]
    pub scan_interval_secs: Option<u64>,
}

/// Runs sweeper and scanner until Ctrl-C, then waits for in-flight cycles.
pub async fn execute(args: &RunArgs, env: &CommandEnv) -> anyhow::Result<()> {
    let mut config = env.config.clone();
    if let Some(secs) = args.sweep_interval_secs {
        config.sweep_interval_secs = secs;
    }
    if let Some(secs) = args.scan_interval_secs {
        config.scan_interval_secs = secs;
    }
    config.validate()?;

    // Applies migrations up front so both tasks start on the current schema.
    drop(env.open()?);

    let tasks = BackgroundTasks::start(env.db_path.clone(), config, Arc::new(SystemClock));
    info!(
        "event=run_start module=cli status=ok db={}",
        env.db_path.display()
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("event=run_stop module=cli status=start");
    tasks.shutdown().await;
    Ok(())
}
