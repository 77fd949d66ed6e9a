//! # btcount
//!
//! Hourly balance history over an append-only ledger of signed transactions.
//!
//! Raw transactions are folded into cumulative per-hour snapshots by the
//! [`Bucketer`]. A background [`Materializer`] persists those snapshots one
//! closed hour at a time, checkpointed against the newest persisted row. The
//! [`BalanceReader`] answers range queries by stitching persisted snapshots,
//! on-the-fly buckets for hours the materializer has not reached yet, and the
//! [`CurrentHourCache`] holding the live balance of the open hour.
//!
//! ```rust,ignore
//! use btcount::{BalanceReader, CurrentHourCache, Materializer, SystemClock};
//! use btcount::adapters::postgres::PostgresAdapter;
//!
//! let adapter = Arc::new(PostgresAdapter::from_pool(pool));
//! adapter.init_schema().await?;
//!
//! let clock = Arc::new(SystemClock);
//! let cache = CurrentHourCache::init(adapter.as_ref(), adapter.as_ref(), clock.as_ref())
//!     .await
//!     .ok()
//!     .map(Arc::new);
//!
//! let reader = BalanceReader::new(adapter.clone(), adapter.clone(), cache, clock.clone());
//! let history = reader.fetch_balance_by_hour(since, till).await?;
//! ```
//!
//! ## Feature flags
//!
//! | Flag       | Default | Description                  |
//! |------------|---------|------------------------------|
//! | `postgres` | ✓       | PostgreSQL adapter via sqlx  |

pub mod adapters;
pub mod bucket;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod materializer;
pub mod reader;
pub mod transaction;

pub use crate::adapters::{LedgerStore, MemoryAdapter, SnapshotStore};
pub use crate::bucket::{Bucketer, ClosingBucket, collect};
pub use crate::cache::CurrentHourCache;
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{Config, ConfigError, LogFormat};
pub use crate::error::{Error, Result};
pub use crate::materializer::Materializer;
pub use crate::reader::BalanceReader;
pub use crate::transaction::{
    RunningSnapshot, Snapshot, TimeRange, Transaction, TransactionRequest, hour_end, hour_start,
    round_up_hour,
};
pub use rust_decimal::Decimal;
