//! Windowed group-by/count queries over the event store
//!
//! One parameterized query serves every dimension: the dimension picks the
//! column(s), the window mode picks the cutoff.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

use crate::analytics::error::QueryError;
use crate::analytics::models::{validate_limit, AggregateEntry, Dimension, WindowMode};
use crate::storage::EventStore;

/// All metrics for one window, evaluated against a single reference instant
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub window: WindowMode,
    pub generated_at: String,
    pub total_requests: i64,
    #[serde(flatten)]
    pub dimensions: BTreeMap<&'static str, Vec<AggregateEntry>>,
}

/// Aggregation engine. Shares nothing with the request interceptor except
/// the store.
#[derive(Clone)]
pub struct AnalyticsAggregator {
    store: Arc<dyn EventStore>,
}

impl AnalyticsAggregator {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Top `limit` values of `dimension` in `window` as of `now`, by count
    /// descending. An empty window is an empty result, not an error.
    pub async fn top(
        &self,
        dimension: Dimension,
        window: WindowMode,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<AggregateEntry>, QueryError> {
        let limit = validate_limit(limit)?;

        self.store
            .group_count(dimension, window.cutoff(now), limit)
            .await
            .map_err(|err| {
                error!(
                    dimension = %dimension,
                    window = %window,
                    limit,
                    error = %err,
                    "aggregation query failed"
                );
                QueryError::Storage(err)
            })
    }

    /// Like [`top`](Self::top) with unparsed parameters, as received from a
    /// client. Unknown names are rejected rather than defaulted.
    pub async fn top_by_name(
        &self,
        dimension: &str,
        window: &str,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<AggregateEntry>, QueryError> {
        let dimension = dimension.parse::<Dimension>()?;
        let window = window.parse::<WindowMode>()?;
        self.top(dimension, window, limit, now).await
    }

    /// Total requests in `window` as of `now`
    pub async fn count(&self, window: WindowMode, now: DateTime<Utc>) -> Result<i64, QueryError> {
        self.store
            .count(window.cutoff(now))
            .await
            .map_err(|err| {
                error!(window = %window, error = %err, "count query failed");
                QueryError::Storage(err)
            })
    }

    /// Total plus the top `limit` of every dimension, all against `now`
    pub async fn snapshot(
        &self,
        window: WindowMode,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<MetricsSnapshot, QueryError> {
        let limit = validate_limit(limit)?;
        let total_requests = self.count(window, now).await?;

        let mut dimensions = BTreeMap::new();
        for dimension in Dimension::ALL {
            let entries = self.top(dimension, window, limit, now).await?;
            dimensions.insert(dimension.metric_name(), entries);
        }

        Ok(MetricsSnapshot {
            window,
            generated_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            total_requests,
            dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::models::DimensionValue;
    use crate::api::handlers::ApiError;
    use crate::models::{NewRequestEvent, RequestEvent};
    use crate::storage::{StorageError, StorageResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the cutoff each call received
    #[derive(Default)]
    struct RecordingStore {
        cutoffs: Mutex<Vec<Option<i64>>>,
        fail: bool,
    }

    #[async_trait]
    impl EventStore for RecordingStore {
        async fn init(&self) -> StorageResult<()> {
            Ok(())
        }

        async fn append(&self, _event: &NewRequestEvent) -> StorageResult<i64> {
            Ok(1)
        }

        async fn count(&self, since: Option<i64>) -> StorageResult<i64> {
            self.cutoffs.lock().unwrap().push(since);
            if self.fail {
                return Err(StorageError::Other(anyhow::anyhow!("disk on fire")));
            }
            Ok(7)
        }

        async fn group_count(
            &self,
            dimension: Dimension,
            since: Option<i64>,
            _limit: i64,
        ) -> StorageResult<Vec<AggregateEntry>> {
            self.cutoffs.lock().unwrap().push(since);
            if self.fail {
                return Err(StorageError::Other(anyhow::anyhow!("disk on fire")));
            }
            Ok(vec![AggregateEntry {
                value: DimensionValue::Text(dimension.as_str().to_string()),
                count: 1,
            }])
        }

        async fn recent(&self, _limit: i64) -> StorageResult<Vec<RequestEvent>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_unknown_dimension_never_reaches_store() {
        let store = Arc::new(RecordingStore::default());
        let aggregator = AnalyticsAggregator::new(store.clone());

        let err = aggregator
            .top_by_name("planet", "day", 5, Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            QueryError::InvalidParameter { name: "dimension", .. }
        ));
        assert!(store.cutoffs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_window_and_bad_limit_rejected() {
        let store = Arc::new(RecordingStore::default());
        let aggregator = AnalyticsAggregator::new(store.clone());

        let err = aggregator
            .top_by_name("country", "decade", 5, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidParameter { name: "window", .. }));

        let err = aggregator
            .top(Dimension::Country, WindowMode::Day, 0, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidParameter { name: "limit", .. }));

        assert!(store.cutoffs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_shares_one_cutoff() {
        let store = Arc::new(RecordingStore::default());
        let aggregator = AnalyticsAggregator::new(store.clone());
        let now = Utc::now();

        let snapshot = aggregator.snapshot(WindowMode::Hour, 3, now).await.unwrap();

        assert_eq!(snapshot.total_requests, 7);
        assert_eq!(snapshot.dimensions.len(), Dimension::ALL.len());

        let cutoffs = store.cutoffs.lock().unwrap();
        assert_eq!(cutoffs.len(), Dimension::ALL.len() + 1);
        let expected = WindowMode::Hour.cutoff(now);
        assert!(cutoffs.iter().all(|c| *c == expected));
    }

    #[tokio::test]
    async fn test_alltime_passes_no_cutoff() {
        let store = Arc::new(RecordingStore::default());
        let aggregator = AnalyticsAggregator::new(store.clone());

        aggregator.count(WindowMode::AllTime, Utc::now()).await.unwrap();
        assert_eq!(*store.cutoffs.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_storage_failure_is_generic_query_error() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let aggregator = AnalyticsAggregator::new(store);

        let err = aggregator
            .top(Dimension::Os, WindowMode::Week, 5, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Storage(_)));
        assert_eq!(err.to_string(), "analytics query failed");
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_storage_failure_logged_once_on_api_path() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let aggregator = AnalyticsAggregator::new(store);

        let err = aggregator
            .count(WindowMode::Day, Utc::now())
            .await
            .unwrap_err();
        let api_error = ApiError::from(err);
        assert!(matches!(api_error, ApiError::Internal));

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("ERROR").count(), 1, "{output}");
        assert!(output.contains("count query failed"));
    }

    #[tokio::test]
    async fn test_snapshot_serializes_metrics_by_name() {
        let store = Arc::new(RecordingStore::default());
        let aggregator = AnalyticsAggregator::new(store);

        let snapshot = aggregator
            .snapshot(WindowMode::Day, 10, Utc::now())
            .await
            .unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["window"], "day");
        assert_eq!(json["total_requests"], 7);
        assert!(json["countries"].is_array());
        assert!(json["operating_systems"].is_array());
        assert_eq!(json["coordinates"][0]["count"], 1);
    }
}
