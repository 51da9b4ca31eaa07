//! Start/stop control of the timed reconciliation loop

use super::{CycleReport, Reconciler};
use crate::error::{Result, TrailError};
use crate::notify::Event;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shortest accepted cycle interval
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Loop statistics since the last start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
}

/// Snapshot returned by [`TrailingLoop::status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopStatus {
    pub running: bool,
    pub interval: Option<Duration>,
    pub started_at: Option<DateTime<Utc>>,
    pub stats: LoopStats,
}

struct RunningLoop {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    interval: Duration,
    started_at: DateTime<Utc>,
}

/// Owns the background reconciliation task
pub struct TrailingLoop {
    reconciler: Arc<Reconciler>,
    running: Mutex<Option<RunningLoop>>,
    stats: Arc<RwLock<LoopStats>>,
}

impl TrailingLoop {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            running: Mutex::new(None),
            stats: Arc::new(RwLock::new(LoopStats::default())),
        }
    }

    /// Spawn the loop; the first cycle runs immediately
    pub async fn start(&self, interval: Duration) -> Result<()> {
        if interval < MIN_INTERVAL {
            return Err(TrailError::InvalidCommand(
                "interval must be at least one second".to_string(),
            ));
        }

        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(TrailError::LoopAlreadyRunning);
        }

        let tracked_orders = self
            .reconciler
            .store()
            .list()
            .await?
            .iter()
            .filter(|o| o.status.is_live())
            .count();

        tracing::info!(interval_secs = interval.as_secs(), tracked_orders, "Trailing loop started");
        self.reconciler
            .notify(&Event::BotStarted {
                interval_secs: interval.as_secs(),
                price_threshold: self.reconciler.config().price_threshold,
                tracked_orders,
            })
            .await;

        *self.stats.write().await = LoopStats::default();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            self.reconciler.clone(),
            self.stats.clone(),
            interval,
            stop_rx,
        ));

        *running = Some(RunningLoop {
            stop_tx,
            handle,
            interval,
            started_at: Utc::now(),
        });
        Ok(())
    }

    /// Signal the loop to stop and wait for any in-flight cycle to finish
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        let Some(current) = running.take() else {
            return Err(TrailError::LoopNotRunning);
        };

        // The receiver is gone when the task already exited
        let _ = current.stop_tx.send(true);
        if let Err(e) = current.handle.await {
            tracing::error!(error = %e, "Trailing loop task failed");
        }
        drop(running);

        tracing::info!("Trailing loop stopped");
        self.reconciler.notify(&Event::BotStopped).await;
        Ok(())
    }

    /// Stop if running; used on shutdown
    pub async fn shutdown(&self) {
        match self.stop().await {
            Ok(()) | Err(TrailError::LoopNotRunning) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to stop trailing loop"),
        }
    }

    pub async fn status(&self) -> LoopStatus {
        let running = self.running.lock().await;
        let active = running.as_ref().filter(|r| !r.handle.is_finished());
        LoopStatus {
            running: active.is_some(),
            interval: active.map(|r| r.interval),
            started_at: active.map(|r| r.started_at),
            stats: self.stats.read().await.clone(),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.status().await.running
    }
}

async fn run_loop(
    reconciler: Arc<Reconciler>,
    stats: Arc<RwLock<LoopStats>>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => {}
            _ = ticker.tick() => {}
        }
        if *stop_rx.borrow() || stop_rx.has_changed().is_err() {
            break;
        }

        // Never raced against the stop signal, so a cycle always completes
        let result = reconciler.run_cycle().await;

        let mut stats = stats.write().await;
        stats.cycles += 1;
        stats.last_cycle_at = Some(Utc::now());
        match result {
            Ok(report) => stats.last_report = Some(report),
            Err(e) => {
                stats.failed_cycles += 1;
                tracing::error!(error = %e, "Reconciliation cycle failed");
            }
        }
    }

    tracing::debug!("Trailing loop task exiting");
}
