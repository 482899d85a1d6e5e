use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;

use crate::model::{Coordinates, ForecastEntry, WeatherSnapshot};

use super::{ProviderError, WeatherProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the provider at another host, e.g. a mock server in tests.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<OwError>(&body)
                .ok()
                .and_then(|e| e.message)
                .filter(|m| !m.trim().is_empty());

            tracing::debug!(%status, path, body = %truncate_body(&body), "OpenWeather request failed");
            return Err(ProviderError::Status { status: status.as_u16(), message });
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::Parse(format!("{e} in OpenWeather {path} body: {}", truncate_body(&body)))
        })
    }

    async fn fetch_current(&self, query: &[(&str, &str)]) -> Result<WeatherSnapshot, ProviderError> {
        let mut query = query.to_vec();
        query.push(("units", "metric"));

        let parsed: OwCurrentResponse = self.get_json("/data/2.5/weather", &query).await?;
        Ok(parsed.into_snapshot())
    }

    async fn fetch_forecast(
        &self,
        query: &[(&str, &str)],
    ) -> Result<Vec<ForecastEntry>, ProviderError> {
        let mut query = query.to_vec();
        query.push(("units", "metric"));

        let parsed: OwForecastResponse = self.get_json("/data/2.5/forecast", &query).await?;

        let mut entries: Vec<ForecastEntry> =
            parsed.list.into_iter().map(OwForecastEntry::into_entry).collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }
}

#[derive(Debug, Deserialize)]
struct OwError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    sys: OwSys,
}

impl OwCurrentResponse {
    fn into_snapshot(self) -> WeatherSnapshot {
        let (description, icon_id) = self
            .weather
            .into_iter()
            .next()
            .map(|w| (w.description, w.icon))
            .unwrap_or_else(|| ("Unknown".to_string(), String::new()));

        WeatherSnapshot {
            city_name: self.name,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            description,
            icon_id,
            country_code: self.sys.country.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp_max: f64,
    temp_min: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    weather: Vec<OwWeather>,
}

impl OwForecastEntry {
    fn into_entry(self) -> ForecastEntry {
        ForecastEntry {
            timestamp: self.dt,
            temp_max: self.main.temp_max,
            temp_min: self.main.temp_min,
            icon_id: self.weather.into_iter().next().map(|w| w.icon).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwGeocodeEntry {
    name: Option<String>,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_by_city(&self, city: &str) -> Result<WeatherSnapshot, ProviderError> {
        self.fetch_current(&[("q", city)]).await
    }

    async fn current_by_coords(
        &self,
        coords: Coordinates,
    ) -> Result<WeatherSnapshot, ProviderError> {
        let (lat, lon) = (coords.lat.to_string(), coords.lon.to_string());
        self.fetch_current(&[("lat", lat.as_str()), ("lon", lon.as_str())]).await
    }

    async fn forecast_by_city(&self, city: &str) -> Result<Vec<ForecastEntry>, ProviderError> {
        self.fetch_forecast(&[("q", city)]).await
    }

    async fn forecast_by_coords(
        &self,
        coords: Coordinates,
    ) -> Result<Vec<ForecastEntry>, ProviderError> {
        let (lat, lon) = (coords.lat.to_string(), coords.lon.to_string());
        self.fetch_forecast(&[("lat", lat.as_str()), ("lon", lon.as_str())]).await
    }

    async fn reverse_geocode(&self, coords: Coordinates) -> Result<Option<String>, ProviderError> {
        let (lat, lon) = (coords.lat.to_string(), coords.lon.to_string());
        let query = [("lat", lat.as_str()), ("lon", lon.as_str()), ("limit", "1")];
        let places: Vec<OwGeocodeEntry> = self.get_json("/geo/1.0/reverse", &query).await?;

        Ok(places
            .into_iter()
            .next()
            .and_then(|p| p.name)
            .filter(|n| !n.trim().is_empty()))
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
