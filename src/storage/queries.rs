//! SQL shared by the event store backends

use crate::analytics::models::{Dimension, DimensionColumns};

pub(crate) const SELECT_EVENT_COLUMNS: &str = "id, recorded_at, method, endpoint, status_code, ip, \
     country, city, latitude, longitude, browser, os, device, referrer";

/// Build the group-by query for a dimension.
///
/// `since` and `limit` are the backend's bind placeholders. Column names come
/// from [`Dimension::columns`], never from user input.
pub(crate) fn group_count_sql(dimension: Dimension, since: &str, limit: &str) -> String {
    match dimension.columns() {
        DimensionColumns::Text(column) | DimensionColumns::Integer(column) => format!(
            "SELECT {column} AS dimension_value, COUNT(*) AS visit_count \
             FROM request_events \
             WHERE recorded_at >= {since} \
             GROUP BY {column} \
             ORDER BY visit_count DESC, {column} ASC \
             LIMIT {limit}"
        ),
        DimensionColumns::Pair(first, second) => format!(
            "SELECT {first}, {second}, COUNT(*) AS visit_count \
             FROM request_events \
             WHERE recorded_at >= {since} \
             GROUP BY {first}, {second} \
             ORDER BY visit_count DESC, {first} ASC, {second} ASC \
             LIMIT {limit}"
        ),
    }
}

/// Lower bound used when no window applies
pub(crate) fn since_or_min(since: Option<i64>) -> i64 {
    since.unwrap_or(i64::MIN)
}
