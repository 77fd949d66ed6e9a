use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    adapters::{LedgerStore, SnapshotStore},
    error::Error,
    transaction::{Snapshot, TimeRange, Transaction},
};

#[derive(Clone, Default)]
struct MemoryStore {
    transactions: Arc<Mutex<Vec<Transaction>>>,
    snapshots: Arc<Mutex<BTreeMap<DateTime<Utc>, Snapshot>>>,
}

/// In-process ledger and snapshot table. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    store: MemoryStore,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every persisted snapshot, ascending.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.store.snapshots.lock().values().copied().collect()
    }

    pub fn transaction_count(&self) -> usize {
        self.store.transactions.lock().len()
    }
}

#[async_trait]
impl LedgerStore for MemoryAdapter {
    async fn save(&self, transaction: &Transaction) -> Result<(), Error> {
        self.store.transactions.lock().push(*transaction);
        Ok(())
    }

    async fn load(&self, range: TimeRange) -> Result<Vec<Transaction>, Error> {
        let txs = self.store.transactions.lock();

        let mut selected: Vec<Transaction> = txs
            .iter()
            .filter(|tx| tx.timestamp >= range.since && tx.timestamp < range.till)
            .copied()
            .collect();
        selected.sort_by_key(|tx| tx.timestamp);

        Ok(selected)
    }
}

#[async_trait]
impl SnapshotStore for MemoryAdapter {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), Error> {
        let mut snapshots = self.store.snapshots.lock();
        if snapshots.contains_key(&snapshot.timestamp) {
            return Err(Error::Storage(format!(
                "snapshot at {} already exists",
                snapshot.timestamp
            )));
        }
        snapshots.insert(snapshot.timestamp, *snapshot);
        Ok(())
    }

    async fn save_many(&self, snapshots: &[Snapshot]) -> Result<(), Error> {
        for snapshot in snapshots {
            SnapshotStore::save(self, snapshot).await?;
        }
        Ok(())
    }

    async fn load(&self, range: TimeRange) -> Result<Vec<Snapshot>, Error> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let snapshots = self.store.snapshots.lock();
        Ok(snapshots
            .range(range.since..=range.till)
            .filter(|(ts, _)| **ts > range.since)
            .map(|(_, s)| *s)
            .collect())
    }

    async fn load_latest_at_or_before(&self, at: DateTime<Utc>) -> Result<Snapshot, Error> {
        let snapshots = self.store.snapshots.lock();
        snapshots
            .range(..=at)
            .next_back()
            .map(|(_, s)| *s)
            .ok_or(Error::NotFound)
    }
}
