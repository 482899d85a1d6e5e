use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current conditions for a single city, as returned by the proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    /// Canonical city name as spelled by the provider.
    pub city_name: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub description: String,
    pub icon_id: String,
    pub country_code: String,
}

/// One forecast reading. After reduction there is one per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastEntry {
    /// Unix seconds, UTC.
    pub timestamp: i64,
    pub temp_max: f64,
    pub temp_min: f64,
    pub icon_id: String,
}

impl ForecastEntry {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Combined response of the coordinate lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordsWeather {
    /// Display name: reverse-geocoded when available, else `weather.city_name`.
    pub city: String,
    pub weather: WeatherSnapshot,
    pub forecast: Vec<ForecastEntry>,
}

/// Body of every error response sent by the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}
