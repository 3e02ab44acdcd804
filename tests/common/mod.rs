//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use zwischen::analytics::models::{AggregateEntry, Dimension};
use zwischen::analytics::{GeoError, GeoLookup, GeoOutcome};
use zwischen::api::create_app;
use zwischen::config::InstrumentationConfig;
use zwischen::models::{
    ClientAgent, DeviceClass, LocationData, NewRequestEvent, RequestEvent,
};
use zwischen::state::AppState;
use zwischen::storage::{EventStore, SqliteEventStore, StorageError, StorageResult};

pub const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Mobile/15E148 Safari/604.1";
pub const CHROME_WINDOWS_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Helper to create test storage
pub async fn create_test_store() -> Arc<dyn EventStore> {
    let store = SqliteEventStore::new("sqlite::memory:", 5).await.unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

pub fn london() -> LocationData {
    LocationData {
        country: "United Kingdom".to_string(),
        city: "London".to_string(),
        latitude: 51.5142,
        longitude: -0.0931,
    }
}

pub fn tokyo() -> LocationData {
    LocationData {
        country: "Japan".to_string(),
        city: "Tokyo".to_string(),
        latitude: 35.6895,
        longitude: 139.6917,
    }
}

/// Event with plausible defaults at the given time
pub fn event_at(timestamp: i64) -> NewRequestEvent {
    NewRequestEvent {
        timestamp,
        method: "GET".to_string(),
        endpoint: "/".to_string(),
        status_code: 200,
        ip: "81.2.69.142".to_string(),
        location: london(),
        agent: ClientAgent {
            browser: "Chrome".to_string(),
            os: "Windows 10".to_string(),
            device: DeviceClass::Desktop,
        },
        referrer: "unknown".to_string(),
    }
}

pub fn event_in_country(country: &str, timestamp: i64) -> NewRequestEvent {
    let mut event = event_at(timestamp);
    event.location = LocationData {
        country: country.to_string(),
        city: format!("{country} City"),
        latitude: 1.0,
        longitude: 2.0,
    };
    event
}

/// Geolocation backed by a fixed table
pub struct StaticGeo(pub HashMap<IpAddr, LocationData>);

impl StaticGeo {
    pub fn standard() -> Arc<dyn GeoLookup> {
        let mut table = HashMap::new();
        table.insert("81.2.69.142".parse().unwrap(), london());
        table.insert("2001:db8::42".parse().unwrap(), tokyo());
        Arc::new(StaticGeo(table))
    }
}

#[async_trait]
impl GeoLookup for StaticGeo {
    async fn lookup(&self, ip: IpAddr) -> Result<GeoOutcome, GeoError> {
        Ok(self
            .0
            .get(&ip)
            .cloned()
            .map(GeoOutcome::Found)
            .unwrap_or(GeoOutcome::NotFound))
    }
}

/// Geolocation whose dataset is gone
pub struct UnavailableGeo;

#[async_trait]
impl GeoLookup for UnavailableGeo {
    async fn lookup(&self, _ip: IpAddr) -> Result<GeoOutcome, GeoError> {
        Err(GeoError::Unavailable("dataset missing".to_string()))
    }
}

/// Store whose every operation fails
pub struct FailingStore;

fn failure() -> StorageError {
    StorageError::Other(anyhow::anyhow!("database is locked"))
}

#[async_trait]
impl EventStore for FailingStore {
    async fn init(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn append(&self, _event: &NewRequestEvent) -> StorageResult<i64> {
        Err(failure())
    }

    async fn count(&self, _since: Option<i64>) -> StorageResult<i64> {
        Err(failure())
    }

    async fn group_count(
        &self,
        _dimension: Dimension,
        _since: Option<i64>,
        _limit: i64,
    ) -> StorageResult<Vec<AggregateEntry>> {
        Err(failure())
    }

    async fn recent(&self, _limit: i64) -> StorageResult<Vec<RequestEvent>> {
        Err(failure())
    }
}

/// Instrumented app with a few demo routes
pub fn create_test_app(store: Arc<dyn EventStore>, geo: Arc<dyn GeoLookup>) -> Router {
    let routes = Router::new()
        .route("/", get(|| async { "hello from zwischen" }))
        .route("/api/x", get(|| async { "x" }).post(|| async { StatusCode::CREATED }))
        .route("/boom", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(1100)).await;
                "done"
            }),
        )
        .route("/echo", post(|body: String| async move { body }));

    let state = AppState::new(&InstrumentationConfig::default(), store, geo);
    create_app(routes, state)
}

/// Request arriving from `peer`, as axum's connect-info service would tag it
pub fn request_from(peer: &str, method: &str, uri: &str) -> axum::http::request::Builder {
    let ip: IpAddr = peer.parse().unwrap();
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::new(ip, 50_000)))
}

pub fn get_from(peer: &str, uri: &str) -> Request<Body> {
    request_from(peer, "GET", uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
