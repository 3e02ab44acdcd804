//! GeoIP lookup service using MaxMind GeoLite2/GeoIP2 City MMDB
//!
//! The dataset is memory-mapped once at startup and shared by every lookup.
//! Lookups run on the blocking pool and are bounded by a timeout so a slow
//! dataset cannot stall request handling.

use async_trait::async_trait;
use maxminddb::{geoip2, Mmap, Reader};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::GeoIpConfig;
use crate::models::LocationData;

/// Successful answer from a geolocation lookup
#[derive(Debug, Clone, PartialEq)]
pub enum GeoOutcome {
    Found(LocationData),
    /// The address is valid but the dataset has no complete record for it
    NotFound,
}

/// The geolocation dataset could not answer
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geolocation dataset unavailable: {0}")]
    Unavailable(String),
    #[error("geolocation lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// IP to location lookup capability
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Result<GeoOutcome, GeoError>;
}

/// Resolve `ip` to a location, substituting sentinel values when the
/// dataset has no record or cannot be reached.
pub async fn locate(geo: &dyn GeoLookup, ip: IpAddr) -> LocationData {
    match geo.lookup(ip).await {
        Ok(GeoOutcome::Found(location)) => location,
        Ok(GeoOutcome::NotFound) => {
            info!(%ip, "address not present in geolocation dataset");
            LocationData::unknown()
        }
        Err(err) => {
            warn!(%ip, error = %err, "geolocation unavailable, storing unknown location");
            LocationData::unknown()
        }
    }
}

/// MaxMind City database resolver
#[derive(Clone)]
pub struct GeoIpResolver {
    reader: Option<Arc<Reader<Mmap>>>,
    timeout: Duration,
}

impl GeoIpResolver {
    /// Memory-map the City database at `path`.
    ///
    /// Fails if the file is missing or is not a readable MMDB, so a broken
    /// deployment is caught at startup rather than on every request.
    pub fn open(path: &str, timeout: Duration) -> Result<Self, GeoError> {
        let reader = unsafe { Reader::open_mmap(path) }.map_err(|e| {
            GeoError::Unavailable(format!("failed to open GeoIP City database at {path}: {e}"))
        })?;

        // Walk the search tree once so a truncated file fails here
        reader
            .lookup(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)))
            .map_err(|e| {
                GeoError::Unavailable(format!("GeoIP City database at {path} is unreadable: {e}"))
            })?;

        Ok(Self {
            reader: Some(Arc::new(reader)),
            timeout,
        })
    }

    /// Resolver that knows no addresses. Every lookup reports `NotFound`.
    pub fn disabled() -> Self {
        Self {
            reader: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn from_config(config: &GeoIpConfig) -> Result<Self, GeoError> {
        match config.city_db_path.as_deref() {
            Some(path) => Self::open(path, Duration::from_millis(config.lookup_timeout_ms)),
            None => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.reader.is_some()
    }

    fn lookup_blocking(reader: &Reader<Mmap>, ip: IpAddr) -> Result<GeoOutcome, GeoError> {
        let result = reader
            .lookup(ip)
            .map_err(|e| GeoError::Unavailable(e.to_string()))?;

        let Some(city) = result
            .decode::<geoip2::City>()
            .map_err(|e| GeoError::Unavailable(e.to_string()))?
        else {
            return Ok(GeoOutcome::NotFound);
        };

        // Country-only or coordinate-less records count as misses
        match (
            city.country.names.english,
            city.city.names.english,
            city.location.latitude,
            city.location.longitude,
        ) {
            (Some(country), Some(name), Some(latitude), Some(longitude)) => {
                Ok(GeoOutcome::Found(LocationData {
                    country: country.to_string(),
                    city: name.to_string(),
                    latitude,
                    longitude,
                }))
            }
            _ => Ok(GeoOutcome::NotFound),
        }
    }
}

#[async_trait]
impl GeoLookup for GeoIpResolver {
    async fn lookup(&self, ip: IpAddr) -> Result<GeoOutcome, GeoError> {
        let Some(reader) = self.reader.as_ref() else {
            return Ok(GeoOutcome::NotFound);
        };

        let reader = Arc::clone(reader);
        run_bounded(self.timeout, move || Self::lookup_blocking(&reader, ip)).await
    }
}

/// Run a blocking lookup on the blocking pool, giving up after `timeout`.
pub(crate) async fn run_bounded<F>(timeout: Duration, lookup: F) -> Result<GeoOutcome, GeoError>
where
    F: FnOnce() -> Result<GeoOutcome, GeoError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(lookup)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => Err(GeoError::Unavailable(format!(
            "lookup task failed: {join_err}"
        ))),
        Err(_) => Err(GeoError::Timeout(timeout)),
    }
}
