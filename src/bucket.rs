//! Folds raw transactions into cumulative per-hour snapshots.
//!
//! Every emitted amount is a running total seeded with the balance that
//! preceded the batch, so any contiguous slice of the output can be served
//! as-is for a range query.

use rust_decimal::Decimal;

use crate::transaction::{Snapshot, Transaction, hour_end};

/// What to do with the last bucket once the batch is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClosingBucket {
    /// Always emit the last bucket.
    #[default]
    Always,
    /// Emit the last bucket only when a transaction was folded into it
    /// without opening it. A batch ending on a lone transaction in a fresh
    /// hour loses that hour's closing balance.
    FoldedOnly,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bucketer {
    closing: ClosingBucket,
}

impl Bucketer {
    pub fn new(closing: ClosingBucket) -> Self {
        Self { closing }
    }

    /// Groups `transactions` by hour and returns one cumulative snapshot per
    /// non-empty hour, ascending. The input slice is left untouched.
    pub fn collect(&self, transactions: &[Transaction], seed: Decimal) -> Vec<Snapshot> {
        let Some(first) = transactions.first() else {
            return Vec::new();
        };

        if transactions.len() == 1 {
            return vec![Snapshot::new(hour_end(first.timestamp), seed + first.amount)];
        }

        let mut sorted = transactions.to_vec();
        sorted.sort_by_key(|tx| tx.timestamp);

        let mut stats = Vec::new();
        let mut bucket_end = hour_end(sorted[0].timestamp);
        let mut sum = seed + sorted[0].amount;
        let mut dirty = false;

        for tx in &sorted[1..] {
            if tx.timestamp < bucket_end {
                sum += tx.amount;
                dirty = true;
                continue;
            }

            stats.push(Snapshot::new(bucket_end, sum));

            sum += tx.amount;
            bucket_end = hour_end(tx.timestamp);
            dirty = false;
        }

        if dirty || self.closing == ClosingBucket::Always {
            stats.push(Snapshot::new(bucket_end, sum));
        }

        stats
    }
}

/// [`Bucketer::collect`] with the default closing policy.
pub fn collect(transactions: &[Transaction], seed: Decimal) -> Vec<Snapshot> {
    Bucketer::default().collect(transactions, seed)
}
