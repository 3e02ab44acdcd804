pub mod postgres;
mod queries;
pub mod sqlite;
pub mod trait_def;

pub use postgres::PostgresEventStore;
pub use sqlite::SqliteEventStore;
pub use trait_def::{EventStore, StorageError, StorageResult};

use std::sync::Arc;
use tracing::info;

use crate::config::{DatabaseBackend, DatabaseConfig};

/// Open the configured backend and make sure its schema exists
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn EventStore>> {
    let store: Arc<dyn EventStore> = match config.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite event store: {}", config.url);
            Arc::new(SqliteEventStore::new(&config.url, config.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL event store");
            Arc::new(PostgresEventStore::new(&config.url, config.max_connections).await?)
        }
    };

    store.init().await?;
    Ok(store)
}
