use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::debug;
use uuid::Uuid;

use crate::{
    adapters::{LedgerStore, SnapshotStore},
    error::Error,
    transaction::{Snapshot, TimeRange, Transaction},
};

/// PostgreSQL ledger and snapshot table.
///
/// Schema:
/// ```sql
/// CREATE TABLE btcount_transactions (
///     id uuid PRIMARY KEY,
///     datetime TIMESTAMPTZ NOT NULL,
///     amount NUMERIC NOT NULL
/// );
/// CREATE INDEX idx_transactions_datetime ON btcount_transactions(datetime);
///
/// -- one row per hour boundary, written once
/// CREATE TABLE btcount_history_stats (
///     datetime TIMESTAMPTZ PRIMARY KEY,
///     amount NUMERIC NOT NULL
/// );
/// ```
#[derive(Clone)]
pub struct PostgresAdapter {
    pub(crate) pool: PgPool,
}

impl PostgresAdapter {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<(), Error> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS btcount_transactions (
                id UUID PRIMARY KEY,
                datetime TIMESTAMPTZ NOT NULL,
                amount NUMERIC NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transactions_datetime
            ON btcount_transactions(datetime)
            INCLUDE (amount)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS btcount_history_stats (
                datetime TIMESTAMPTZ PRIMARY KEY,
                amount NUMERIC NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresAdapter {
    async fn save(&self, transaction: &Transaction) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO btcount_transactions (id, datetime, amount)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(transaction.timestamp)
        .bind(transaction.amount)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn load(&self, range: TimeRange) -> Result<Vec<Transaction>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT datetime, amount
            FROM btcount_transactions
            WHERE datetime >= $1 AND datetime < $2
            ORDER BY datetime ASC
            "#,
        )
        .bind(range.since)
        .bind(range.till)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| {
                let (timestamp, amount) = decode_row(row)?;
                Ok(Transaction { amount, timestamp })
            })
            .collect()
    }
}

#[async_trait]
impl SnapshotStore for PostgresAdapter {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO btcount_history_stats (datetime, amount)
            VALUES ($1, $2)
            "#,
        )
        .bind(snapshot.timestamp)
        .bind(snapshot.amount)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn save_many(&self, snapshots: &[Snapshot]) -> Result<(), Error> {
        // Not wrapped in a database transaction: rows inserted before a
        // failure stay committed.
        for (i, snapshot) in snapshots.iter().enumerate() {
            SnapshotStore::save(self, snapshot).await.map_err(|err| {
                debug!(index = i, timestamp = %snapshot.timestamp, "snapshot insert failed");
                match err {
                    Error::Storage(msg) => {
                        Error::Storage(format!("inserting {}: {}", snapshot.timestamp, msg))
                    }
                    other => other,
                }
            })?;
        }

        Ok(())
    }

    async fn load(&self, range: TimeRange) -> Result<Vec<Snapshot>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT datetime, amount
            FROM btcount_history_stats
            WHERE datetime > $1 AND datetime <= $2
            ORDER BY datetime ASC
            "#,
        )
        .bind(range.since)
        .bind(range.till)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| {
                let (timestamp, amount) = decode_row(row)?;
                Ok(Snapshot { timestamp, amount })
            })
            .collect()
    }

    async fn load_latest_at_or_before(&self, at: DateTime<Utc>) -> Result<Snapshot, Error> {
        let row = sqlx::query(
            r#"
            SELECT datetime, amount
            FROM btcount_history_stats
            WHERE datetime <= $1
            ORDER BY datetime DESC
            LIMIT 1
            "#,
        )
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let (timestamp, amount) = decode_row(&row)?;
        Ok(Snapshot { timestamp, amount })
    }
}

fn decode_row(row: &PgRow) -> Result<(DateTime<Utc>, Decimal), Error> {
    let timestamp = row.try_get("datetime").map_err(map_sqlx_error)?;
    let amount = row.try_get("amount").map_err(map_sqlx_error)?;
    Ok((timestamp, amount))
}

fn map_sqlx_error(err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::RowNotFound => Error::NotFound,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::TypeNotFound { .. } => {
            Error::UnexpectedType(err.to_string())
        }
        other => Error::Storage(other.to_string()),
    }
}
