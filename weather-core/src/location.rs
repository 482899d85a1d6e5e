//! Device geolocation collaborator.

use async_trait::async_trait;

use crate::model::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Permission to access location was denied.")]
    PermissionDenied,
    #[error("Could not fetch location. Please ensure location services are on.")]
    Unavailable(String),
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    async fn current_coordinates(&self) -> Result<Coordinates, LocationError>;
}

/// Location known up front, e.g. passed on the command line.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_coordinates(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// A host with no location service at all.
#[derive(Debug, Clone, Default)]
pub struct UnavailableLocation {
    pub reason: String,
}

#[async_trait]
impl LocationProvider for UnavailableLocation {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_coordinates(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unavailable(self.reason.clone()))
    }
}
