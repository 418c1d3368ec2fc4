use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::{BookingFilter, BookingRepository, BookingSubscription, LocationProvider, PermissionStatus};
use crate::errors::AppError;
use crate::models::{Booking, BookingPatch, Coordinate};
use crate::services::proximity::{self, MapRegion};

const UNKNOWN_DISTANCE: &str = "--";
const UNKNOWN_ETA: &str = "Calculating...";

/// What the tracking view renders for one moment in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityReport {
    pub booking_id: String,
    pub therapist_name: String,
    pub client: Coordinate,
    pub therapist: Option<Coordinate>,
    pub updated_at: Option<DateTime<Utc>>,
    pub distance_km: Option<f64>,
    pub distance_label: String,
    pub eta_minutes: Option<i64>,
    pub eta_label: String,
    pub region: MapRegion,
}

/// Follows one booking's therapist position relative to the client. The
/// underlying change feed is released when the tracker is dropped.
pub struct TherapistTracker {
    booking_id: String,
    therapist_name: String,
    client: Coordinate,
    therapist: Option<Coordinate>,
    updated_at: Option<DateTime<Utc>>,
    subscription: BookingSubscription,
}

impl TherapistTracker {
    pub async fn start(
        repository: &dyn BookingRepository,
        location: &dyn LocationProvider,
        booking: &Booking,
    ) -> Result<Self, AppError> {
        if location.request_permission().await == PermissionStatus::Denied {
            return Err(AppError::PermissionDenied(
                "Location permission not granted".to_string(),
            ));
        }
        let client = location.get_current_position().await?;

        let subscription = repository
            .subscribe_to_updates(BookingFilter::Booking(booking.id.clone()))
            .await?;

        let mut tracker = Self {
            booking_id: booking.id.clone(),
            therapist_name: booking.therapist_display_name().to_string(),
            client,
            therapist: booking.therapist_location(),
            updated_at: booking.therapist_location_updated_at,
            subscription,
        };

        // The held record may predate the latest ping.
        match repository.fetch_booking(&booking.id).await {
            Ok(Some(latest)) => {
                tracker.apply(&BookingPatch::from(&latest));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, error = %e, "initial therapist location fetch failed");
            }
        }

        tracing::info!(
            booking_id = %tracker.booking_id,
            topic = tracker.subscription.topic(),
            "tracking therapist"
        );
        Ok(tracker)
    }

    pub fn report(&self) -> ProximityReport {
        let estimate = self
            .therapist
            .map(|therapist| proximity::estimate(self.client, therapist));
        let region = match self.therapist {
            Some(therapist) => MapRegion::fit(self.client, therapist),
            None => MapRegion::around(self.client),
        };

        ProximityReport {
            booking_id: self.booking_id.clone(),
            therapist_name: self.therapist_name.clone(),
            client: self.client,
            therapist: self.therapist,
            updated_at: self.updated_at,
            distance_km: estimate.as_ref().map(|e| e.distance_km),
            distance_label: estimate
                .as_ref()
                .map(|e| e.distance_label.clone())
                .unwrap_or_else(|| UNKNOWN_DISTANCE.to_string()),
            eta_minutes: estimate.as_ref().map(|e| e.eta_minutes),
            eta_label: estimate
                .map(|e| e.eta_label)
                .unwrap_or_else(|| UNKNOWN_ETA.to_string()),
            region,
        }
    }

    /// Waits for the next change that moves the therapist or renames them.
    /// `None` once the feed has closed or the booking has ended.
    pub async fn next_report(&mut self) -> Option<ProximityReport> {
        loop {
            let patch = self.subscription.next().await?;
            if let Some(status) = patch.status.filter(|s| s.is_terminal()) {
                tracing::info!(
                    booking_id = %self.booking_id,
                    status = status.as_str(),
                    "booking ended, tracking stopped"
                );
                return None;
            }
            if self.apply(&patch) {
                return Some(self.report());
            }
        }
    }

    fn apply(&mut self, patch: &BookingPatch) -> bool {
        let mut changed = false;

        if let Some(name) = patch.therapist_name.as_deref().filter(|n| !n.trim().is_empty()) {
            if name != self.therapist_name {
                self.therapist_name = name.to_string();
                changed = true;
            }
        }

        if let Some(position) = patch.therapist_location() {
            if let (Some(held), Some(incoming)) = (self.updated_at, patch.therapist_location_updated_at) {
                if incoming < held {
                    return changed;
                }
            }
            if self.therapist != Some(position) {
                self.therapist = Some(position);
                changed = true;
            }
            if patch.therapist_location_updated_at.is_some() {
                self.updated_at = patch.therapist_location_updated_at;
            }
        }

        changed
    }
}
