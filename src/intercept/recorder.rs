//! Turns an observed request into a persisted event

use axum::http::Uri;
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::analytics::{classify, locate, GeoLookup};
use crate::models::{NewRequestEvent, UNKNOWN_CLIENT};
use crate::storage::EventStore;

/// What the interceptor saw of one request/response cycle
#[derive(Debug, Clone)]
pub struct ObservedRequest {
    pub method: String,
    /// Raw request target, possibly with query string
    pub uri: String,
    pub status: u16,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    /// `None` when no valid client address could be determined
    pub client_ip: Option<IpAddr>,
    pub completed_at: DateTime<Utc>,
}

/// Reduce a request target to its path, dropping query and fragment
pub fn normalize_endpoint(raw: &str) -> String {
    let without_fragment = raw.split('#').next().unwrap_or_default();

    let path = match without_fragment.parse::<Uri>() {
        Ok(uri) => uri.path().to_string(),
        Err(_) => without_fragment
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    if path.is_empty() {
        "/".to_string()
    } else {
        path
    }
}

fn or_unknown(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Enriches observed requests and appends them to the store
#[derive(Clone)]
pub struct EventRecorder {
    store: Arc<dyn EventStore>,
    geo: Arc<dyn GeoLookup>,
}

impl EventRecorder {
    pub fn new(store: Arc<dyn EventStore>, geo: Arc<dyn GeoLookup>) -> Self {
        Self { store, geo }
    }

    /// Enrich and persist one observation.
    ///
    /// Returns the assigned id, or `None` when the request was skipped or
    /// could not be stored. Failures are logged here and go no further.
    pub async fn record(&self, observed: ObservedRequest) -> Option<i64> {
        let Some(ip) = observed.client_ip else {
            warn!(
                method = %observed.method,
                uri = %observed.uri,
                "no valid client address, request not recorded"
            );
            return None;
        };

        let user_agent = observed.user_agent.unwrap_or_default();
        let (location, agent) = tokio::join!(locate(self.geo.as_ref(), ip), async {
            classify(&user_agent)
        });

        let event = NewRequestEvent {
            timestamp: observed.completed_at.timestamp(),
            method: observed.method,
            endpoint: normalize_endpoint(&observed.uri),
            status_code: observed.status,
            ip: ip.to_string(),
            location,
            agent,
            referrer: or_unknown(observed.referrer),
        };

        match self.store.append(&event).await {
            Ok(id) => {
                debug!(id, endpoint = %event.endpoint, status = event.status_code, "request event stored");
                Some(id)
            }
            Err(err) => {
                error!(
                    error = %err,
                    method = %event.method,
                    endpoint = %event.endpoint,
                    status = event.status_code,
                    ip = %event.ip,
                    "failed to store request event"
                );
                None
            }
        }
    }
}
