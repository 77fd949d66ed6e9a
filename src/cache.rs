use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    adapters::{LedgerStore, SnapshotStore, checkpoint_at},
    bucket::collect,
    clock::Clock,
    error::Result,
    transaction::{RunningSnapshot, TimeRange, Transaction},
};

/// Running total for the hour that has not been materialized yet.
///
/// Reads take the shared lock; `collect` and `adjust` both take the
/// exclusive lock so no concurrent update is lost.
#[derive(Debug)]
pub struct CurrentHourCache {
    last: RwLock<RunningSnapshot>,
}

impl CurrentHourCache {
    pub fn new(seed: RunningSnapshot) -> Self {
        Self {
            last: RwLock::new(seed),
        }
    }

    /// Seeds the cache from the newest persisted snapshot plus every ledger
    /// entry recorded after it.
    pub async fn init(
        ledger: &dyn LedgerStore,
        snapshots: &dyn SnapshotStore,
        clock: &dyn Clock,
    ) -> Result<Self> {
        let now = clock.now();
        let checkpoint = checkpoint_at(snapshots, now).await?;

        let txs = ledger.load(TimeRange::new(checkpoint.timestamp, now)).await?;
        let stats = collect(&txs, checkpoint.amount);

        let seed = match stats.last() {
            Some(stat) => RunningSnapshot::from(*stat),
            None => RunningSnapshot::from(checkpoint),
        };

        debug!(
            timestamp = %seed.timestamp,
            amount = %seed.amount,
            transactions = txs.len(),
            "created current hour cache"
        );

        Ok(Self::new(seed))
    }

    /// Folds a freshly persisted transaction into the running total.
    pub fn collect(&self, tx: &Transaction) {
        let mut last = self.last.write();
        last.amount += tx.amount;
        last.timestamp = tx.timestamp;
    }

    /// Overwrites the running total with a value read from the ledger.
    pub fn adjust(&self, amount: Decimal, clock: &dyn Clock) {
        let mut last = self.last.write();
        last.amount = amount;
        last.timestamp = clock.now();
    }

    pub fn snapshot(&self) -> RunningSnapshot {
        *self.last.read()
    }
}
