//! Core library for the weather app.
//!
//! This crate defines:
//! - Shared domain models (snapshots, forecasts, the coordinate response)
//! - Abstraction over the upstream weather provider, with an OpenWeather client
//! - The client-side store and the HTTP client it uses to reach the proxy
//! - Persistence of favorites and client configuration
//!
//! It is used by `weather-proxy` (provider side) and `weather-cli` (store side).

pub mod client;
pub mod config;
pub mod forecast;
pub mod location;
pub mod model;
pub mod persist;
pub mod provider;
pub mod store;

pub use client::{ApiError, HttpProxyClient, ProxyApi};
pub use config::ClientConfig;
pub use model::{Coordinates, CoordsWeather, ErrorBody, ForecastEntry, WeatherSnapshot};
pub use provider::{OpenWeatherProvider, ProviderError, WeatherProvider};
pub use store::{FetchOutcome, StoreState, WeatherStore};
