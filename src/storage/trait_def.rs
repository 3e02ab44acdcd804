use async_trait::async_trait;
use thiserror::Error;

use crate::analytics::models::{AggregateEntry, Dimension};
use crate::models::{NewRequestEvent, RequestEvent};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only ledger of request events.
///
/// There is deliberately no update or delete operation.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> StorageResult<()>;

    /// Persist an event and return its id. The event is durable, and fully
    /// visible to readers, once this returns `Ok`.
    async fn append(&self, event: &NewRequestEvent) -> StorageResult<i64>;

    /// Number of events with `timestamp >= since` (all events when `None`)
    async fn count(&self, since: Option<i64>) -> StorageResult<i64>;

    /// Top `limit` values of `dimension` among events with
    /// `timestamp >= since`, by count descending then value ascending
    async fn group_count(
        &self,
        dimension: Dimension,
        since: Option<i64>,
        limit: i64,
    ) -> StorageResult<Vec<AggregateEntry>>;

    /// Most recent events, newest first
    async fn recent(&self, limit: i64) -> StorageResult<Vec<RequestEvent>>;
}
