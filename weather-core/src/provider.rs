use crate::model::{Coordinates, ForecastEntry, WeatherSnapshot};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

pub use openweather::OpenWeatherProvider;

/// Failure talking to the upstream weather provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider answered with a non-success status. `message` is the
    /// provider's own text when it sent one.
    #[error("provider returned status {status}: {}", .message.as_deref().unwrap_or("<no message>"))]
    Status { status: u16, message: Option<String> },

    #[error("failed to reach provider: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

impl ProviderError {
    /// HTTP status the provider answered with, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn provider_message(&self) -> Option<&str> {
        match self {
            ProviderError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Upstream lookups the proxy forwards to.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_by_city(&self, city: &str) -> Result<WeatherSnapshot, ProviderError>;

    async fn current_by_coords(&self, coords: Coordinates)
    -> Result<WeatherSnapshot, ProviderError>;

    /// Raw 3-hourly series, chronological. Not reduced.
    async fn forecast_by_city(&self, city: &str) -> Result<Vec<ForecastEntry>, ProviderError>;

    async fn forecast_by_coords(
        &self,
        coords: Coordinates,
    ) -> Result<Vec<ForecastEntry>, ProviderError>;

    /// Display name of the place at `coords`; `Ok(None)` when nothing matched.
    async fn reverse_geocode(&self, coords: Coordinates) -> Result<Option<String>, ProviderError>;
}
