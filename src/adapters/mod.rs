pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::MemoryAdapter;

use crate::{
    error::Error,
    transaction::{Snapshot, TimeRange, Transaction},
};

/// -----------------------------
/// Storage contracts
/// -----------------------------

/// Append-only store of raw transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn save(&self, transaction: &Transaction) -> Result<(), Error>;

    /// Transactions with `since <= timestamp < till`, ascending by timestamp.
    async fn load(&self, range: TimeRange) -> Result<Vec<Transaction>, Error>;
}

/// Persisted hour-boundary snapshots. Each boundary is written at most once.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), Error>;

    /// Saves snapshots one by one, stopping at the first failure. Rows saved
    /// before the failure stay saved.
    async fn save_many(&self, snapshots: &[Snapshot]) -> Result<(), Error>;

    /// Snapshots with `since < timestamp <= till`, ascending by timestamp.
    async fn load(&self, range: TimeRange) -> Result<Vec<Snapshot>, Error>;

    /// Latest snapshot with `timestamp <= at`, or [`Error::NotFound`].
    async fn load_latest_at_or_before(&self, at: DateTime<Utc>) -> Result<Snapshot, Error>;
}

/// Latest snapshot at or before `at`, with an empty table read as the zero
/// seed at the epoch.
pub(crate) async fn checkpoint_at(
    store: &dyn SnapshotStore,
    at: DateTime<Utc>,
) -> Result<Snapshot, Error> {
    match store.load_latest_at_or_before(at).await {
        Ok(snapshot) => Ok(snapshot),
        Err(Error::NotFound) => Ok(Snapshot::zero()),
        Err(err) => Err(err),
    }
}
