//! Analytics API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::ApiError;
use crate::analytics::models::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::analytics::{AggregateEntry, Dimension, MetricsSnapshot, QueryError, WindowMode};
use crate::state::AppState;

/// Query string for analytics endpoints.
///
/// Kept as text so that malformed values get the same error body as
/// unknown ones.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQueryParams {
    /// Window mode (default: alltime)
    pub window: Option<String>,

    /// Top-N (default: 10, max: 1000)
    pub limit: Option<String>,
}

impl AnalyticsQueryParams {
    fn window(&self) -> Result<WindowMode, QueryError> {
        match self.window.as_deref() {
            None => Ok(WindowMode::AllTime),
            Some(raw) => raw.parse(),
        }
    }

    fn limit(&self) -> Result<i64, QueryError> {
        match self.limit.as_deref() {
            None => Ok(DEFAULT_LIMIT),
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                QueryError::invalid(
                    "limit",
                    format!("limit must be an integer between 1 and {MAX_LIMIT}, got '{raw}'"),
                )
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopResponse {
    pub dimension: Dimension,
    pub window: WindowMode,
    pub entries: Vec<AggregateEntry>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub window: WindowMode,
    pub count: i64,
}

/// Total requests plus the top values of every dimension
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsQueryParams>,
) -> Result<Json<MetricsSnapshot>, ApiError> {
    let window = params.window()?;
    let limit = params.limit()?;

    let snapshot = state.aggregator.snapshot(window, limit, Utc::now()).await?;
    Ok(Json(snapshot))
}

/// Top values of a single dimension
pub async fn get_top(
    State(state): State<Arc<AppState>>,
    Path(dimension): Path<String>,
    Query(params): Query<AnalyticsQueryParams>,
) -> Result<Json<TopResponse>, ApiError> {
    let dimension = dimension.parse::<Dimension>()?;
    let window = params.window()?;
    let limit = params.limit()?;

    let entries = state
        .aggregator
        .top(dimension, window, limit, Utc::now())
        .await?;

    Ok(Json(TopResponse {
        dimension,
        window,
        entries,
    }))
}

/// Total requests in a window
pub async fn get_count(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsQueryParams>,
) -> Result<Json<CountResponse>, ApiError> {
    let window = params.window()?;
    let count = state.aggregator.count(window, Utc::now()).await?;

    Ok(Json(CountResponse { window, count }))
}
