//! Periodic background tasks: retention sweep and alert scan.
//!
//! # Responsibility
//! - Run the sweeper and the scanner on independent intervals.
//! - Stop both on a shutdown signal after their in-flight cycle finishes.
//!
//! # Invariants
//! - Each cycle opens its own connection inside `spawn_blocking`.
//! - Cycle failures are logged and the loop continues.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::db::open_db;
use crate::repo::notification_repo::SqliteNotificationRepository;
use crate::repo::record_repo::SqliteRecordStore;
use crate::repo::trash_repo::SqliteTrashRepository;
use crate::service::alert_scanner::AlertScanner;
use crate::service::notification_service::NotificationService;
use crate::service::sweeper::RetentionSweeper;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

type Cycle = Arc<dyn Fn() + Send + Sync>;

/// Handles to the running sweeper and scanner tasks.
pub struct BackgroundTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Starts both tasks with the intervals from `config`.
    ///
    /// Must be called from within a tokio runtime. The first cycle of each
    /// task runs immediately.
    pub fn start(db_path: PathBuf, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let sweep_interval = config.sweep_interval();
        let scan_interval = config.scan_interval();
        Self::start_with_intervals(db_path, config, clock, sweep_interval, scan_interval)
    }

    /// Starts both tasks with explicit intervals.
    pub fn start_with_intervals(
        db_path: PathBuf,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        sweep_interval: Duration,
        scan_interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);

        let sweep = sweep_cycle(db_path.clone(), Arc::clone(&clock));
        let scan = scan_cycle(db_path, config, clock);
        let handles = vec![
            tokio::spawn(run_periodic(
                "retention_sweep",
                sweep_interval,
                shutdown.subscribe(),
                sweep,
            )),
            tokio::spawn(run_periodic(
                "alert_scan",
                scan_interval,
                shutdown.subscribe(),
                scan,
            )),
        ];

        Self { shutdown, handles }
    }

    /// Signals both tasks to stop and waits for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!("event=worker_join module=worker status=error error={err}");
            }
        }
        info!("event=worker_shutdown module=worker status=ok");
    }
}

async fn run_periodic(
    task: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    cycle: Cycle,
) {
    info!(
        "event=worker_start module=worker status=ok task={} interval_ms={}",
        task,
        period.as_millis()
    );

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let cycle = Arc::clone(&cycle);
        if let Err(err) = tokio::task::spawn_blocking(move || cycle()).await {
            error!(
                "event=worker_cycle module=worker status=error task={} error={}",
                task, err
            );
        }
    }

    info!("event=worker_stop module=worker status=ok task={task}");
}

fn sweep_cycle(db_path: PathBuf, clock: Arc<dyn Clock>) -> Cycle {
    Arc::new(move || {
        let conn = match open_db(&db_path) {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=trash_sweep module=worker status=error stage=open transient={} error={}",
                    err.is_transient(),
                    err
                );
                return;
            }
        };
        let sweeper = RetentionSweeper::new(SqliteTrashRepository::new(&conn), Arc::clone(&clock));
        // Per-entry failures are logged by the sweeper and retried next cycle.
        let _ = sweeper.sweep_expired();
    })
}

fn scan_cycle(db_path: PathBuf, config: EngineConfig, clock: Arc<dyn Clock>) -> Cycle {
    Arc::new(move || {
        let conn = match open_db(&db_path) {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=alert_scan module=worker status=error stage=open transient={} error={}",
                    err.is_transient(),
                    err
                );
                return;
            }
        };
        let scanner = AlertScanner::new(
            SqliteRecordStore::new(&conn),
            Arc::clone(&clock),
            config.clone(),
        );
        let candidates = match scanner.scan(config.lookahead_days) {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(
                    "event=alert_scan module=worker status=error stage=scan transient={} error={}",
                    err.is_transient(),
                    err
                );
                return;
            }
        };
        let service = NotificationService::new(
            SqliteNotificationRepository::new(&conn),
            Arc::clone(&clock),
            &config,
        );
        // Reconcile failures are logged by the service; the next cycle retries.
        let _ = service.apply_candidates(&candidates);
    })
}
