//! Query parameters and results for analytics

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::analytics::error::QueryError;

/// Largest accepted top-N limit
pub const MAX_LIMIT: i64 = 1000;

/// Top-N limit used when a request does not specify one
pub const DEFAULT_LIMIT: i64 = 10;

/// Attribute of a request event that aggregates can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Country,
    City,
    Method,
    Endpoint,
    StatusCode,
    Browser,
    Os,
    Device,
    Referrer,
    Ip,
    Coordinates,
}

/// How a dimension is laid out in the event table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionColumns {
    Text(&'static str),
    Integer(&'static str),
    Pair(&'static str, &'static str),
}

impl Dimension {
    pub const ALL: [Dimension; 11] = [
        Dimension::Country,
        Dimension::City,
        Dimension::Method,
        Dimension::Endpoint,
        Dimension::StatusCode,
        Dimension::Browser,
        Dimension::Os,
        Dimension::Device,
        Dimension::Referrer,
        Dimension::Ip,
        Dimension::Coordinates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Country => "country",
            Dimension::City => "city",
            Dimension::Method => "method",
            Dimension::Endpoint => "endpoint",
            Dimension::StatusCode => "status_code",
            Dimension::Browser => "browser",
            Dimension::Os => "os",
            Dimension::Device => "device",
            Dimension::Referrer => "referrer",
            Dimension::Ip => "ip",
            Dimension::Coordinates => "coordinates",
        }
    }

    /// Key under which this dimension appears in the metrics response
    pub fn metric_name(self) -> &'static str {
        match self {
            Dimension::Country => "countries",
            Dimension::City => "cities",
            Dimension::Method => "methods",
            Dimension::Endpoint => "endpoints",
            Dimension::StatusCode => "status_codes",
            Dimension::Browser => "browsers",
            Dimension::Os => "operating_systems",
            Dimension::Device => "devices",
            Dimension::Referrer => "referrers",
            Dimension::Ip => "ips",
            Dimension::Coordinates => "coordinates",
        }
    }

    /// Event table column(s) holding this dimension.
    ///
    /// Column names are fixed identifiers and safe to splice into SQL.
    pub fn columns(self) -> DimensionColumns {
        match self {
            Dimension::Country => DimensionColumns::Text("country"),
            Dimension::City => DimensionColumns::Text("city"),
            Dimension::Method => DimensionColumns::Text("method"),
            Dimension::Endpoint => DimensionColumns::Text("endpoint"),
            Dimension::StatusCode => DimensionColumns::Integer("status_code"),
            Dimension::Browser => DimensionColumns::Text("browser"),
            Dimension::Os => DimensionColumns::Text("os"),
            Dimension::Device => DimensionColumns::Text("device"),
            Dimension::Referrer => DimensionColumns::Text("referrer"),
            Dimension::Ip => DimensionColumns::Text("ip"),
            Dimension::Coordinates => DimensionColumns::Pair("latitude", "longitude"),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|dimension| dimension.as_str() == s)
            .ok_or_else(|| {
                QueryError::invalid(
                    "dimension",
                    format!(
                        "unknown dimension '{s}', expected one of: {}",
                        Dimension::ALL.map(Dimension::as_str).join(", ")
                    ),
                )
            })
    }
}

/// Calendar-aligned time range used to filter events before aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    Hour,
    Day,
    Week,
    Month,
    Year,
    AllTime,
}

impl WindowMode {
    pub const ALL: [WindowMode; 6] = [
        WindowMode::Hour,
        WindowMode::Day,
        WindowMode::Week,
        WindowMode::Month,
        WindowMode::Year,
        WindowMode::AllTime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WindowMode::Hour => "hour",
            WindowMode::Day => "day",
            WindowMode::Week => "week",
            WindowMode::Month => "month",
            WindowMode::Year => "year",
            WindowMode::AllTime => "alltime",
        }
    }
}

impl fmt::Display for WindowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowMode {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WindowMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                QueryError::invalid(
                    "window",
                    format!(
                        "unknown window mode '{s}', expected one of: {}",
                        WindowMode::ALL.map(WindowMode::as_str).join(", ")
                    ),
                )
            })
    }
}

/// Check a top-N limit against the accepted range
pub fn validate_limit(limit: i64) -> Result<i64, QueryError> {
    if (1..=MAX_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(QueryError::invalid(
            "limit",
            format!("limit must be between 1 and {MAX_LIMIT}, got {limit}"),
        ))
    }
}

/// Grouped value of a dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Text(String),
    Integer(i64),
    Coordinates { latitude: f64, longitude: f64 },
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionValue::Text(value) => f.write_str(value),
            DimensionValue::Integer(value) => write!(f, "{value}"),
            DimensionValue::Coordinates {
                latitude,
                longitude,
            } => write!(f, "{latitude},{longitude}"),
        }
    }
}

/// One row of a top-N result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateEntry {
    #[serde(rename = "dimension_value")]
    pub value: DimensionValue,
    pub count: i64,
}
