use std::sync::Arc;

use crate::analytics::{AnalyticsAggregator, GeoLookup};
use crate::config::{ClientIpConfig, InstrumentationConfig};
use crate::intercept::{EventRecorder, ExemptPaths};
use crate::storage::EventStore;

/// Services shared by the interceptor and the analytics handlers
pub struct AppState {
    pub recorder: EventRecorder,
    pub aggregator: AnalyticsAggregator,
    pub exemptions: ExemptPaths,
    pub client_ip: ClientIpConfig,
}

impl AppState {
    pub fn new(
        config: &InstrumentationConfig,
        store: Arc<dyn EventStore>,
        geo: Arc<dyn GeoLookup>,
    ) -> Arc<Self> {
        Arc::new(Self {
            recorder: EventRecorder::new(Arc::clone(&store), geo),
            aggregator: AnalyticsAggregator::new(store),
            exemptions: ExemptPaths::new(&config.exempt_path_prefixes),
            client_ip: config.client_ip.clone(),
        })
    }
}
