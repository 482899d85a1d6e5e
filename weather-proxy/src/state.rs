//! Application state shared across handlers.

use std::sync::Arc;

use weather_core::WeatherProvider;

/// Holds only the provider handle; no request state is shared.
#[derive(Debug, Clone)]
pub struct AppState {
    provider: Arc<dyn WeatherProvider>,
}

impl AppState {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    #[must_use]
    pub fn provider(&self) -> &dyn WeatherProvider {
        self.provider.as_ref()
    }
}
