//! Error type for route handlers.
//!
//! Every failure is answered with a JSON `{ "message": ... }` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use weather_core::{ErrorBody, ProviderError};

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing, blank or malformed request parameter.
    #[error("Bad request: {0}")]
    BadRequest(&'static str),

    /// Upstream call failed. `fallback` is sent when the provider gave no
    /// message of its own.
    #[error("Upstream error: {source}")]
    Upstream {
        source: ProviderError,
        fallback: &'static str,
    },
}

impl ProxyError {
    pub fn upstream(fallback: &'static str) -> impl FnOnce(ProviderError) -> Self {
        move |source| ProxyError::Upstream { source, fallback }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { source, .. } => source
                .status()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::BadRequest(message) => (*message).to_string(),
            Self::Upstream { source, fallback } => {
                source.provider_message().unwrap_or(fallback).to_string()
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, %status, "Request error");
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }

        (status, Json(ErrorBody::new(self.message()))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
