use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::analytics::models::{AggregateEntry, Dimension, DimensionColumns, DimensionValue};
use crate::models::{NewRequestEvent, RequestEvent};
use crate::storage::queries::{group_count_sql, since_or_min, SELECT_EVENT_COLUMNS};
use crate::storage::{EventStore, StorageResult};

pub struct SqliteEventStore {
    pool: Arc<SqlitePool>,
    /// SQLite allows one writer at a time; appends queue here instead of
    /// failing with SQLITE_BUSY. Held only for the INSERT itself.
    write_lock: Mutex<()>,
}

impl SqliteEventStore {
    pub async fn new(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
            write_lock: Mutex::new(()),
        })
    }
}

fn decode_entry(row: &SqliteRow, columns: DimensionColumns) -> Result<AggregateEntry, sqlx::Error> {
    let value = match columns {
        DimensionColumns::Text(_) => DimensionValue::Text(row.try_get("dimension_value")?),
        DimensionColumns::Integer(_) => DimensionValue::Integer(row.try_get("dimension_value")?),
        DimensionColumns::Pair(first, second) => DimensionValue::Coordinates {
            latitude: row.try_get(first)?,
            longitude: row.try_get(second)?,
        },
    };

    Ok(AggregateEntry {
        value,
        count: row.try_get("visit_count")?,
    })
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn init(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS request_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recorded_at INTEGER NOT NULL,
                method TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                status_code INTEGER NOT NULL,
                ip TEXT NOT NULL,
                country TEXT NOT NULL,
                city TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                browser TEXT NOT NULL,
                os TEXT NOT NULL,
                device TEXT NOT NULL,
                referrer TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_request_events_recorded_at ON request_events(recorded_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn append(&self, event: &NewRequestEvent) -> StorageResult<i64> {
        let _guard = self.write_lock.lock().await;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO request_events (
                recorded_at, method, endpoint, status_code, ip,
                country, city, latitude, longitude,
                browser, os, device, referrer
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(event.timestamp)
        .bind(&event.method)
        .bind(&event.endpoint)
        .bind(i32::from(event.status_code))
        .bind(&event.ip)
        .bind(&event.location.country)
        .bind(&event.location.city)
        .bind(event.location.latitude)
        .bind(event.location.longitude)
        .bind(&event.agent.browser)
        .bind(&event.agent.os)
        .bind(event.agent.device.as_str())
        .bind(&event.referrer)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(id)
    }

    async fn count(&self, since: Option<i64>) -> StorageResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM request_events WHERE recorded_at >= ?",
        )
        .bind(since_or_min(since))
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn group_count(
        &self,
        dimension: Dimension,
        since: Option<i64>,
        limit: i64,
    ) -> StorageResult<Vec<AggregateEntry>> {
        let sql = group_count_sql(dimension, "?", "?");
        let columns = dimension.columns();

        let rows = sqlx::query(&sql)
            .bind(since_or_min(since))
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?;

        let entries = rows
            .iter()
            .map(|row| decode_entry(row, columns))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    async fn recent(&self, limit: i64) -> StorageResult<Vec<RequestEvent>> {
        let events = sqlx::query_as::<_, RequestEvent>(&format!(
            "SELECT {SELECT_EVENT_COLUMNS} FROM request_events ORDER BY id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(events)
    }
}
