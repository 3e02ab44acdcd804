use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::analytics::{get_count, get_metrics, get_top};
use super::handlers::health_check;
use crate::intercept::instrument;
use crate::state::AppState;

/// Analytics and health routes, mounted at the root
pub fn create_analytics_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/analytics/metrics", get(get_metrics))
        .route("/analytics/count", get(get_count))
        .route("/analytics/top/{dimension}", get(get_top))
        .with_state(state)
}

/// Merge the application's own routes with the analytics routes and wrap
/// everything in the request interceptor.
pub fn create_app(app_routes: Router, state: Arc<AppState>) -> Router {
    app_routes
        .merge(create_analytics_router(Arc::clone(&state)))
        .layer(middleware::from_fn_with_state(state, instrument))
        .layer(TraceLayer::new_for_http())
}
