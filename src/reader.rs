use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::debug;

use crate::{
    adapters::{LedgerStore, SnapshotStore, checkpoint_at},
    bucket::collect,
    cache::CurrentHourCache,
    clock::Clock,
    error::{Error, Result},
    transaction::{Snapshot, TimeRange, TransactionRequest, hour_start, round_up_hour},
};

/// Write path for new transactions and read path for hourly balance
/// history.
///
/// Reads merge three sources: persisted snapshots, buckets computed on the
/// fly from the raw ledger for whatever the materializer has not reached
/// yet, and the current-hour cache when one is available. The reader never
/// persists snapshots.
#[derive(Clone)]
pub struct BalanceReader {
    ledger: Arc<dyn LedgerStore>,
    snapshots: Arc<dyn SnapshotStore>,
    cache: Option<Arc<CurrentHourCache>>,
    clock: Arc<dyn Clock>,
}

impl BalanceReader {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        snapshots: Arc<dyn SnapshotStore>,
        cache: Option<Arc<CurrentHourCache>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            snapshots,
            cache,
            clock,
        }
    }

    /// Validates and appends a transaction to the ledger. The cache only sees
    /// the transaction once the ledger write succeeded.
    pub async fn create_transaction(&self, request: TransactionRequest) -> Result<()> {
        let transaction = request.into_transaction()?;

        debug!(amount = %transaction.amount, timestamp = %transaction.timestamp, "saving");

        self.ledger
            .save(&transaction)
            .await
            .map_err(|err| match err {
                Error::Storage(msg) => {
                    Error::Storage(format!("saving transaction to the storage: {}", msg))
                }
                other => other,
            })?;

        if let Some(cache) = &self.cache {
            cache.collect(&transaction);
        }

        Ok(())
    }

    /// Cumulative balance at each hour boundary in `(since, till]`, ascending.
    ///
    /// `since` is truncated to its hour and `till` rounded up to the next
    /// boundary. When the range reaches into the open hour the last entry
    /// may be a live, non-aligned balance.
    pub async fn fetch_balance_by_hour(
        &self,
        since: DateTime<Utc>,
        till: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>> {
        if till < since {
            return Err(Error::InvalidInput(format!(
                "till {} is before since {}",
                till, since
            )));
        }
        let since = hour_start(since);
        let till = round_up_hour(till);

        debug!(since = %since, till = %till, "time ranges");

        let mut stats = self.snapshots.load(TimeRange::new(since, till)).await?;

        let Some(mut last) = stats.last().copied() else {
            debug!("no stats loaded, using slow method");
            counter!("btcount.reader.fetch.total", "path" => "cold").increment(1);
            return self.load_balance_slow(since, till).await;
        };

        debug!(len = stats.len(), "loaded history stats");

        if last.timestamp >= till {
            counter!("btcount.reader.fetch.total", "path" => "materialized").increment(1);
            return Ok(stats);
        }

        counter!("btcount.reader.fetch.total", "path" => "gap").increment(1);

        let now = self.clock.now();
        let current_hour = hour_start(now);

        // The materializer is behind: fill the closed hours from the ledger.
        if last.timestamp < current_hour {
            let missing = self.buckets_from(last, till.min(current_hour)).await?;
            if let Some(newest) = missing.last() {
                last = *newest;
            }
            stats.extend(missing);
        }

        if till <= current_hour {
            return Ok(stats);
        }

        match &self.cache {
            Some(cache) => {
                debug!("loading leftovers from cache");
                push_live(&mut stats, cache, since, now);
            }
            None => {
                let txs = self
                    .ledger
                    .load(TimeRange::new(current_hour.max(last.timestamp), till))
                    .await?;
                stats.extend(collect(&txs, last.amount));
            }
        }

        Ok(stats)
    }

    /// Answers a range with no persisted snapshots from the raw ledger.
    async fn load_balance_slow(
        &self,
        since: DateTime<Utc>,
        till: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>> {
        let now = self.clock.now();
        let current_hour = hour_start(now);
        let checkpoint = checkpoint_at(self.snapshots.as_ref(), since).await?;

        let mut stats: Vec<Snapshot> = self
            .buckets_from(checkpoint, till)
            .await?
            .into_iter()
            .filter(|stat| stat.timestamp > since)
            .collect();

        let (Some(cache), true) = (&self.cache, till > current_hour) else {
            return Ok(stats);
        };

        match stats.last() {
            // Buckets already reach into the open hour.
            Some(newest) if newest.timestamp > current_hour => {
                debug!(amount = %newest.amount, "adjusting cache");
                cache.adjust(newest.amount, self.clock.as_ref());
            }
            _ => push_live(&mut stats, cache, since, now),
        }

        Ok(stats)
    }

    /// Buckets every ledger entry in `[from.timestamp, till)` on top of
    /// `from.amount`.
    async fn buckets_from(&self, from: Snapshot, till: DateTime<Utc>) -> Result<Vec<Snapshot>> {
        let range = TimeRange::new(from.timestamp, till);
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let txs = self.ledger.load(range).await?;
        Ok(collect(&txs, from.amount))
    }
}

/// Appends the cache entry for the open hour. An entry not newer than what
/// precedes it means nothing was collected since, so it is restamped to `now`.
fn push_live(
    stats: &mut Vec<Snapshot>,
    cache: &CurrentHourCache,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) {
    let floor = stats.last().map_or(since, |last| last.timestamp);
    let mut live = Snapshot::from(cache.snapshot());
    if live.timestamp <= floor {
        live.timestamp = now;
    }
    if live.timestamp > floor {
        stats.push(live);
    }
}
