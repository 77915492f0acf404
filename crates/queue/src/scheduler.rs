//! Scheduled reconciliation of expired reservation holds.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eventix_core::{ReconciliationService, SweepReport};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Shortest period the loop will tick at.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between reconciliation sweeps (default: 1 minute).
    pub reconciliation_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reconciliation_interval: Duration::from_secs(60),
        }
    }
}

/// Job executor trait for the reconciliation sweep.
#[async_trait::async_trait]
pub trait ReconciliationExecutor: Send + Sync {
    /// Release holds that expired before `now`.
    async fn reconcile(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, Box<dyn std::error::Error + Send + Sync>>;
}

#[async_trait::async_trait]
impl ReconciliationExecutor for ReconciliationService {
    async fn reconcile(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.sweep(now).await?)
    }
}

/// Run one sweep and log its result.
///
/// Returns `None` when the sweep failed as a whole.
pub async fn run_reconciliation<E: ReconciliationExecutor + ?Sized>(
    executor: &E,
) -> Option<SweepReport> {
    match executor.reconcile(Utc::now()).await {
        Ok(report) => {
            if report.scanned > 0 {
                tracing::info!(
                    scanned = report.scanned,
                    released = report.released,
                    expired_registrations = report.expired_registrations,
                    conflicts = report.conflicts,
                    skipped = report.skipped,
                    failed = report.failed,
                    "Reconciliation sweep finished"
                );
            }
            Some(report)
        }
        Err(e) => {
            tracing::error!(error = %e, "Reconciliation sweep failed");
            None
        }
    }
}

/// Spawn the reconciliation loop.
///
/// Sweeps never overlap: a slow sweep delays the next tick instead of
/// queueing a burst. Intervals below one second are raised to one second.
pub fn run_scheduler<E: ReconciliationExecutor + 'static>(
    config: SchedulerConfig,
    executor: Arc<E>,
) -> JoinHandle<()> {
    let period = if config.reconciliation_interval < MIN_INTERVAL {
        tracing::warn!(
            requested = ?config.reconciliation_interval,
            "Reconciliation interval too short, using 1s"
        );
        MIN_INTERVAL
    } else {
        config.reconciliation_interval
    };

    tokio::spawn(async move {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            run_reconciliation(executor.as_ref()).await;
        }
    })
}
