use async_trait::async_trait;

use super::{LocationProvider, PermissionStatus};
use crate::errors::AppError;
use crate::models::Coordinate;

/// Device location for headless runs: a configured position and permission answer.
pub struct FixedLocationProvider {
    position: Option<Coordinate>,
    granted: bool,
}

impl FixedLocationProvider {
    pub fn new(position: Option<Coordinate>, granted: bool) -> Self {
        Self { position, granted }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn request_permission(&self) -> PermissionStatus {
        if self.granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    async fn get_current_position(&self) -> Result<Coordinate, AppError> {
        if !self.granted {
            return Err(AppError::PermissionDenied(
                "location permission not granted".to_string(),
            ));
        }
        self.position
            .ok_or_else(|| AppError::LocationUnavailable("no device position configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_granted_with_position() {
        let provider = FixedLocationProvider::new(Some(Coordinate::new(14.5995, 120.9842)), true);
        assert_eq!(provider.request_permission().await, PermissionStatus::Granted);
        let pos = provider.get_current_position().await.unwrap();
        assert_eq!(pos, Coordinate::new(14.5995, 120.9842));
    }

    #[tokio::test]
    async fn test_denied() {
        let provider = FixedLocationProvider::new(Some(Coordinate::new(0.0, 0.0)), false);
        assert_eq!(provider.request_permission().await, PermissionStatus::Denied);
        assert!(matches!(
            provider.get_current_position().await,
            Err(AppError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_position() {
        let provider = FixedLocationProvider::new(None, true);
        assert!(matches!(
            provider.get_current_position().await,
            Err(AppError::LocationUnavailable(_))
        ));
    }
}
