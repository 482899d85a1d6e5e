//! `/api` routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use weather_core::{
    Coordinates, CoordsWeather, ForecastEntry, WeatherSnapshot, forecast::daily_samples,
};

use crate::{
    error::{ProxyError, Result},
    state::AppState,
};

const CITY_REQUIRED: &str = "City name is required.";
const COORDS_REQUIRED: &str = "Latitude and longitude are required.";
const COORDS_NOT_NUMERIC: &str = "Latitude and longitude must be numbers.";
const INTERNAL_FALLBACK: &str = "An internal server error occurred.";
const COORDS_FALLBACK: &str = "Failed to get weather for your location.";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/weather/by-coords", get(weather_by_coords))
        .route("/api/weather/{city}", get(weather_by_city))
        .route("/api/weather/", get(missing_city))
        .route("/api/forecast/{city}", get(forecast_by_city))
        .route("/api/forecast/", get(missing_city))
}

fn required_city(city: &str) -> Result<&str> {
    let city = city.trim();
    if city.is_empty() {
        return Err(ProxyError::BadRequest(CITY_REQUIRED));
    }
    Ok(city)
}

async fn missing_city() -> ProxyError {
    ProxyError::BadRequest(CITY_REQUIRED)
}

async fn weather_by_city(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<WeatherSnapshot>> {
    let city = required_city(&city)?;

    let snapshot = state
        .provider()
        .current_by_city(city)
        .await
        .map_err(ProxyError::upstream(INTERNAL_FALLBACK))?;

    Ok(Json(snapshot))
}

async fn forecast_by_city(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<Vec<ForecastEntry>>> {
    let city = required_city(&city)?;

    let series = state
        .provider()
        .forecast_by_city(city)
        .await
        .map_err(ProxyError::upstream(INTERNAL_FALLBACK))?;

    Ok(Json(daily_samples(&series)))
}

#[derive(Debug, Deserialize)]
struct CoordsQuery {
    lat: Option<String>,
    lon: Option<String>,
}

impl CoordsQuery {
    fn coordinates(&self) -> Result<Coordinates> {
        let present = |v: &Option<String>| {
            v.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
        };

        let (Some(lat), Some(lon)) = (present(&self.lat), present(&self.lon)) else {
            return Err(ProxyError::BadRequest(COORDS_REQUIRED));
        };

        match (lat.parse::<f64>(), lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) if lat.is_finite() && lon.is_finite() => {
                Ok(Coordinates { lat, lon })
            }
            _ => Err(ProxyError::BadRequest(COORDS_NOT_NUMERIC)),
        }
    }
}

/// Weather and forecast for a position, named by reverse geocoding when
/// possible. Only the weather lookup can fail the request; a missing
/// forecast or place name degrades the response instead.
async fn weather_by_coords(
    State(state): State<AppState>,
    Query(query): Query<CoordsQuery>,
) -> Result<Json<CoordsWeather>> {
    let coords = query.coordinates()?;
    let provider = state.provider();

    let (weather, forecast, place) = tokio::join!(
        provider.current_by_coords(coords),
        provider.forecast_by_coords(coords),
        provider.reverse_geocode(coords),
    );

    let weather = weather.map_err(ProxyError::upstream(COORDS_FALLBACK))?;
    let forecast = forecast.unwrap_or_else(|e| {
        tracing::warn!(?coords, "Could not fetch forecast, returning none: {e}");
        Vec::new()
    });

    let city = match place {
        Ok(Some(name)) => name,
        Ok(None) => {
            tracing::debug!(?coords, "no reverse geocoding match, using weather name");
            weather.city_name.clone()
        }
        Err(e) => {
            tracing::warn!(?coords, "Could not fetch city name, using weather name: {e}");
            weather.city_name.clone()
        }
    };

    Ok(Json(CoordsWeather { city, weather, forecast: daily_samples(&forecast) }))
}
