//! Request enrichment and aggregate analytics
//!
//! Enrichment (geolocation, User-Agent classification, client IP
//! extraction) feeds the request interceptor; the aggregator answers
//! windowed top-N and count queries over the stored events.

pub mod aggregator;
pub mod error;
pub mod geoip;
pub mod ip_extractor;
pub mod models;
pub mod user_agent;
mod window;

pub use aggregator::{AnalyticsAggregator, MetricsSnapshot};
pub use error::QueryError;
pub use geoip::{locate, GeoError, GeoIpResolver, GeoLookup, GeoOutcome};
pub use ip_extractor::{anonymize_ip, extract_client_ip, validate_ip};
pub use models::{AggregateEntry, Dimension, DimensionValue, WindowMode};
pub use user_agent::classify;
