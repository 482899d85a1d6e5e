//! HTTP client for the weather proxy, as used by the store.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::model::{Coordinates, CoordsWeather, ErrorBody, ForecastEntry, WeatherSnapshot};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The proxy answered with a non-success status.
    #[error("proxy returned status {status}: {}", .message.as_deref().unwrap_or("<no message>"))]
    Status { status: u16, message: Option<String> },

    /// The proxy could not be reached or the connection broke.
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("invalid proxy url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Operations the store needs from the proxy.
#[async_trait]
pub trait ProxyApi: Send + Sync {
    async fn weather_by_city(&self, city: &str) -> Result<WeatherSnapshot, ApiError>;

    async fn forecast_by_city(&self, city: &str) -> Result<Vec<ForecastEntry>, ApiError>;

    async fn weather_by_coords(&self, coords: Coordinates) -> Result<CoordsWeather, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpProxyClient {
    base: Url,
    http: Client,
}

impl HttpProxyClient {
    /// `base_url` is the proxy's API root, e.g. `http://127.0.0.1:3000/api`.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { base, http })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        tracing::debug!(%url, "proxy request");
        let res = self.http.get(url).send().await?;

        let status = res.status();
        if !status.is_success() {
            let message = res
                .json::<ErrorBody>()
                .await
                .ok()
                .map(|b| b.message)
                .filter(|m| !m.trim().is_empty());
            return Err(ApiError::Status { status: status.as_u16(), message });
        }

        Ok(res.json::<T>().await?)
    }
}

#[async_trait]
impl ProxyApi for HttpProxyClient {
    async fn weather_by_city(&self, city: &str) -> Result<WeatherSnapshot, ApiError> {
        let url = self.url(&["weather", city])?;
        self.get_json(url).await
    }

    async fn forecast_by_city(&self, city: &str) -> Result<Vec<ForecastEntry>, ApiError> {
        let url = self.url(&["forecast", city])?;
        self.get_json(url).await
    }

    async fn weather_by_coords(&self, coords: Coordinates) -> Result<CoordsWeather, ApiError> {
        let mut url = self.url(&["weather", "by-coords"])?;
        url.query_pairs_mut()
            .append_pair("lat", &coords.lat.to_string())
            .append_pair("lon", &coords.lon.to_string());
        self.get_json(url).await
    }
}
