//! Proxy configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `OPENWEATHER_API_KEY` - OpenWeather API key, never sent to clients
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 3000)
//! - `OPENWEATHER_BASE_URL` - Provider root (default: https://api.openweathermap.org)

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;
use weather_core::provider::openweather::DEFAULT_BASE_URL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing OpenWeather API key (set OPENWEATHER_API_KEY)")]
    MissingApiKey,
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Redacted in `Debug` output by `SecretString`.
    pub api_key: SecretString,
    pub host: IpAddr,
    pub port: u16,
    pub provider_base_url: String,
}

impl ProxyConfig {
    /// Load configuration from the process environment.
    ///
    /// Calls `dotenvy::dotenv()` first so a local `.env` file is honoured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the API key is missing or blank, or if a
    /// variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("OPENWEATHER_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let host = lookup("HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;

        let provider_base_url = lookup("OPENWEATHER_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self { api_key: SecretString::from(api_key), host, port, provider_base_url })
    }

    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
