use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Placeholder for geolocation fields that could not be resolved
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Placeholder for client fields that could not be classified or were absent
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Geographic location of a client address.
///
/// Either every field comes from the dataset or every field is a sentinel;
/// there is no partially populated location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationData {
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN_LOCATION.to_string(),
            city: UNKNOWN_LOCATION.to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }
}

impl Default for LocationData {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Coarse device class derived from the User-Agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Desktop,
    Tablet,
    Mobile,
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Desktop => "desktop",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Mobile => "mobile",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown device class '{0}'")]
pub struct UnknownDeviceClass(pub String);

impl FromStr for DeviceClass {
    type Err = UnknownDeviceClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "desktop" => Ok(DeviceClass::Desktop),
            "tablet" => Ok(DeviceClass::Tablet),
            "mobile" => Ok(DeviceClass::Mobile),
            other => Err(UnknownDeviceClass(other.to_string())),
        }
    }
}

impl TryFrom<String> for DeviceClass {
    type Error = UnknownDeviceClass;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Browser, operating system and device class of a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAgent {
    pub browser: String,
    pub os: String,
    pub device: DeviceClass,
}

impl ClientAgent {
    pub fn unknown() -> Self {
        Self {
            browser: UNKNOWN_CLIENT.to_string(),
            os: UNKNOWN_CLIENT.to_string(),
            device: DeviceClass::Desktop,
        }
    }
}

/// A request observation that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequestEvent {
    /// Unix timestamp (seconds, UTC) taken when the response completed
    pub timestamp: i64,
    pub method: String,
    /// Path component only
    pub endpoint: String,
    pub status_code: u16,
    pub ip: String,
    pub location: LocationData,
    pub agent: ClientAgent,
    pub referrer: String,
}

/// A persisted request observation. There is no way to modify one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RequestEvent {
    pub id: i64,
    #[sqlx(rename = "recorded_at")]
    pub timestamp: i64,
    pub method: String,
    pub endpoint: String,
    pub status_code: i32,
    pub ip: String,
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub browser: String,
    pub os: String,
    #[sqlx(try_from = "String")]
    pub device: DeviceClass,
    pub referrer: String,
}

impl RequestEvent {
    pub fn location(&self) -> LocationData {
        LocationData {
            country: self.country.clone(),
            city: self.city.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_location_is_all_sentinel() {
        let location = LocationData::unknown();
        assert_eq!(location.country, "Unknown");
        assert_eq!(location.city, "Unknown");
        assert_eq!(location.latitude, 0.0);
        assert_eq!(location.longitude, 0.0);
        assert!(location.is_unknown());
    }

    #[test]
    fn test_device_class_round_trip_through_text() {
        for device in [DeviceClass::Desktop, DeviceClass::Tablet, DeviceClass::Mobile] {
            assert_eq!(device.as_str().parse::<DeviceClass>(), Ok(device));
        }
        assert!("phablet".parse::<DeviceClass>().is_err());
    }
}
