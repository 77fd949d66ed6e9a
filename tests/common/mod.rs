#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use btcount::{
    Clock, Decimal, Error, LedgerStore, ManualClock, MemoryAdapter, Snapshot, SnapshotStore,
    TimeRange, Transaction,
};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

pub fn dec(v: &str) -> Decimal {
    Decimal::from_str(v).unwrap()
}

/// `2010-01-02T00:00:00Z` shifted by `n` hours.
pub fn hour(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2010, 1, 2, 0, 0, 0).unwrap() + TimeDelta::hours(n)
}

pub fn at(n: i64, minutes: i64) -> DateTime<Utc> {
    hour(n) + TimeDelta::minutes(minutes)
}

pub fn clock_at(now: DateTime<Utc>) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(now))
}

pub fn as_clock(clock: &Arc<ManualClock>) -> Arc<dyn Clock> {
    clock.clone()
}

/// Memory-backed store that counts every call and fails on demand.
#[derive(Default)]
pub struct ProbeStore {
    pub inner: MemoryAdapter,
    pub ledger_saves: AtomicUsize,
    pub ledger_loads: AtomicUsize,
    pub snapshot_saves: AtomicUsize,
    pub snapshot_loads: AtomicUsize,
    pub latest_loads: AtomicUsize,
    fail_ledger_saves: AtomicUsize,
    fail_latest_loads: AtomicUsize,
    snapshot_save_budget: AtomicUsize,
}

impl ProbeStore {
    pub fn new() -> Arc<Self> {
        let store = Self::default();
        store.snapshot_save_budget.store(usize::MAX, Ordering::SeqCst);
        Arc::new(store)
    }

    /// Fails the next `n` ledger saves.
    pub fn fail_ledger_saves(&self, n: usize) {
        self.fail_ledger_saves.store(n, Ordering::SeqCst);
    }

    /// Fails the next `n` checkpoint lookups.
    pub fn fail_latest_loads(&self, n: usize) {
        self.fail_latest_loads.store(n, Ordering::SeqCst);
    }

    /// Allows `n` more snapshot inserts, failing every one after that.
    pub fn limit_snapshot_saves(&self, n: usize) {
        self.snapshot_save_budget.store(n, Ordering::SeqCst);
    }

    pub fn reset_counters(&self) {
        for counter in [
            &self.ledger_saves,
            &self.ledger_loads,
            &self.snapshot_saves,
            &self.snapshot_loads,
            &self.latest_loads,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub async fn seed_ledger(&self, txs: &[(&str, DateTime<Utc>)]) {
        for (amount, timestamp) in txs {
            LedgerStore::save(&self.inner, &Transaction::new(dec(amount), *timestamp))
                .await
                .unwrap();
        }
    }

    pub async fn seed_snapshots(&self, stats: &[(DateTime<Utc>, &str)]) {
        let stats: Vec<_> = stats
            .iter()
            .map(|(timestamp, amount)| Snapshot::new(*timestamp, dec(amount)))
            .collect();
        self.inner.save_many(&stats).await.unwrap();
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl LedgerStore for ProbeStore {
    async fn save(&self, transaction: &Transaction) -> Result<(), Error> {
        self.ledger_saves.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.fail_ledger_saves) {
            return Err(Error::Storage("ledger unavailable".to_string()));
        }
        LedgerStore::save(&self.inner, transaction).await
    }

    async fn load(&self, range: TimeRange) -> Result<Vec<Transaction>, Error> {
        self.ledger_loads.fetch_add(1, Ordering::SeqCst);
        LedgerStore::load(&self.inner, range).await
    }
}

#[async_trait]
impl SnapshotStore for ProbeStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), Error> {
        self.snapshot_saves.fetch_add(1, Ordering::SeqCst);
        if !take_one(&self.snapshot_save_budget) {
            return Err(Error::Storage("snapshot table unavailable".to_string()));
        }
        SnapshotStore::save(&self.inner, snapshot).await
    }

    async fn save_many(&self, snapshots: &[Snapshot]) -> Result<(), Error> {
        for snapshot in snapshots {
            SnapshotStore::save(self, snapshot).await?;
        }
        Ok(())
    }

    async fn load(&self, range: TimeRange) -> Result<Vec<Snapshot>, Error> {
        self.snapshot_loads.fetch_add(1, Ordering::SeqCst);
        SnapshotStore::load(&self.inner, range).await
    }

    async fn load_latest_at_or_before(&self, at: DateTime<Utc>) -> Result<Snapshot, Error> {
        self.latest_loads.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.fail_latest_loads) {
            return Err(Error::Storage("snapshot table unavailable".to_string()));
        }
        self.inner.load_latest_at_or_before(at).await
    }
}
