//! Request interceptor
//!
//! Wraps the request/response cycle, enriches the observation with
//! geolocation and client metadata, and appends it to the event store.

mod exempt;
mod middleware;
mod recorder;

pub use exempt::ExemptPaths;
pub use middleware::instrument;
pub use recorder::{normalize_endpoint, EventRecorder, ObservedRequest};
