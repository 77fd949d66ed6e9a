//! Background job advancing the persisted snapshot table one hour at a time.
//!
//! The latest persisted snapshot is the only checkpoint: every `sync` starts
//! from it, so a run interrupted halfway through a batch resumes on the next
//! call without any extra bookkeeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    adapters::{LedgerStore, SnapshotStore, checkpoint_at},
    bucket::collect,
    clock::Clock,
    error::Result,
    transaction::{TimeRange, hour_end, hour_start},
};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Retrying until the most recently closed hour is materialized.
    Bootstrapping,
    /// Waiting `wait` before the next sync.
    Steady { wait: Duration },
    ShuttingDown,
}

pub struct Materializer {
    ledger: Arc<dyn LedgerStore>,
    snapshots: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    retry_delay: Duration,
}

impl Materializer {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        snapshots: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            snapshots,
            clock,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Materializes every closed hour up to `till` and returns the number of
    /// snapshots written. A no-op once the checkpoint has reached `till`.
    pub async fn sync(&self, till: DateTime<Utc>) -> Result<usize> {
        let started = Instant::now();
        let result = self.write_closed_hours(till).await;

        counter!("btcount.materializer.sync.total",
            "status" => if result.is_ok() { "success" } else { "failed" }
        )
        .increment(1);
        histogram!("btcount.materializer.sync.duration_ms")
            .record(started.elapsed().as_millis() as f64);

        if let Ok(written) = &result {
            counter!("btcount.materializer.snapshots_written").increment(*written as u64);
        }

        result
    }

    async fn write_closed_hours(&self, till: DateTime<Utc>) -> Result<usize> {
        let checkpoint = checkpoint_at(self.snapshots.as_ref(), till).await?;
        if checkpoint.timestamp >= till {
            return Ok(0);
        }

        let txs = self
            .ledger
            .load(TimeRange::new(checkpoint.timestamp, till))
            .await?;
        if txs.is_empty() {
            return Ok(0);
        }

        let stats = collect(&txs, checkpoint.amount);
        self.snapshots.save_many(&stats).await?;

        Ok(stats.len())
    }

    /// Runs until `cancel` fires. Never returns early on a failed sync.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut phase = Phase::Bootstrapping;

        loop {
            phase = match phase {
                Phase::Bootstrapping => self.bootstrap(&cancel).await,
                Phase::Steady { wait } => {
                    tokio::select! {
                        _ = cancel.cancelled() => Phase::ShuttingDown,
                        _ = sleep(wait) => self.tick().await,
                    }
                }
                Phase::ShuttingDown => {
                    info!("materializer canceled");
                    return;
                }
            };
        }
    }

    async fn bootstrap(&self, cancel: &CancellationToken) -> Phase {
        let till = self.last_closed_hour();

        match self.sync(till).await {
            Ok(inserted) => {
                debug!(inserted_stats = inserted, till = %till, "handled first tick");
                Phase::Steady {
                    wait: self.until_next_hour(),
                }
            }
            Err(err) => {
                error!(error = %err, till = %till, "unable to handle first tick");
                tokio::select! {
                    _ = cancel.cancelled() => Phase::ShuttingDown,
                    _ = sleep(self.retry_delay) => Phase::Bootstrapping,
                }
            }
        }
    }

    async fn tick(&self) -> Phase {
        let till = self.last_closed_hour();
        debug!(till = %till, "handle tick for stats");

        match self.sync(till).await {
            Ok(inserted) => {
                debug!(inserted_stats = inserted, "handled tick");
                Phase::Steady {
                    wait: self.until_next_hour(),
                }
            }
            Err(err) => {
                error!(error = %err, till = %till, "unable to handle tick");
                Phase::Steady {
                    wait: self.retry_delay,
                }
            }
        }
    }

    fn last_closed_hour(&self) -> DateTime<Utc> {
        hour_start(self.clock.now())
    }

    fn until_next_hour(&self) -> Duration {
        let now = self.clock.now();
        (hour_end(now) - now).to_std().unwrap_or(Duration::ZERO)
    }
}
