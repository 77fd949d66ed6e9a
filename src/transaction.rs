use chrono::{DateTime, FixedOffset, TimeDelta, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single signed movement on the ledger. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn new(amount: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self { amount, timestamp }
    }
}

/// Cumulative balance as of an exact hour boundary.
///
/// `amount` is the running total of every transaction stamped before
/// `timestamp`, never a per-hour delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>, amount: Decimal) -> Self {
        Self { timestamp, amount }
    }

    /// Seed used when nothing has been materialized yet.
    pub fn zero() -> Self {
        Self {
            timestamp: DateTime::UNIX_EPOCH,
            amount: Decimal::ZERO,
        }
    }
}

/// Best-known balance of the still-open hour. Not hour aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningSnapshot {
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
}

impl RunningSnapshot {
    pub fn zero() -> Self {
        Self {
            timestamp: DateTime::UNIX_EPOCH,
            amount: Decimal::ZERO,
        }
    }
}

impl From<Snapshot> for RunningSnapshot {
    fn from(s: Snapshot) -> Self {
        Self {
            timestamp: s.timestamp,
            amount: s.amount,
        }
    }
}

impl From<RunningSnapshot> for Snapshot {
    fn from(s: RunningSnapshot) -> Self {
        Self {
            timestamp: s.timestamp,
            amount: s.amount,
        }
    }
}

/// Bounds for ledger and snapshot reads.
///
/// Each store documents whether `since`/`till` are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub since: DateTime<Utc>,
    pub till: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(since: DateTime<Utc>, till: DateTime<Utc>) -> Self {
        Self { since, till }
    }

    pub fn is_empty(&self) -> bool {
        self.till <= self.since
    }
}

/// Write-boundary input for a new ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub amount: Decimal,
    pub datetime: Option<DateTime<FixedOffset>>,
}

impl TransactionRequest {
    /// Validates the request and normalizes its datetime to UTC.
    pub fn into_transaction(self) -> Result<Transaction> {
        if self.amount < Decimal::ZERO {
            return Err(Error::InvalidInput(
                "amount: negative value not allowed".to_string(),
            ));
        }

        let datetime = match self.datetime {
            Some(dt) if dt.timestamp() != 0 || dt.timestamp_subsec_nanos() != 0 => dt,
            _ => return Err(Error::InvalidInput("datetime".to_string())),
        };

        Ok(Transaction {
            amount: self.amount,
            timestamp: datetime.with_timezone(&Utc),
        })
    }
}

/// Truncates `t` down to the start of its hour.
pub fn hour_start(t: DateTime<Utc>) -> DateTime<Utc> {
    t - TimeDelta::seconds(i64::from(t.minute() * 60 + t.second()))
        - TimeDelta::nanoseconds(i64::from(t.nanosecond()))
}

/// The boundary closing the hour `t` belongs to.
pub fn hour_end(t: DateTime<Utc>) -> DateTime<Utc> {
    hour_start(t) + TimeDelta::hours(1)
}

/// Rounds `t` up to an hour boundary, leaving exact boundaries untouched.
pub fn round_up_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    let start = hour_start(t);
    if start < t { start + TimeDelta::hours(1) } else { start }
}
