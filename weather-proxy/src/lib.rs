//! HTTP proxy in front of the OpenWeather API.
//!
//! Clients never see the API key: they call `/api/...` here and the proxy
//! forwards to the provider, normalizing payloads and error bodies.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::ProxyConfig;
pub use state::AppState;

/// Full application router with middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Liveness check. Does not touch the provider.
async fn health() -> &'static str {
    "ok"
}
