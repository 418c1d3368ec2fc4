use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::services::status::StatusConfig;
use crate::services::tracking::{ProximityReport, TherapistTracker};
use crate::state::AppState;

fn report_event(report: &ProximityReport) -> Result<Event, Infallible> {
    let data = serde_json::to_string(report).unwrap_or_default();
    Ok(Event::default().data(data).event("proximity"))
}

// GET /api/tracking: proximity reports for the active booking (SSE)
pub async fn tracking_stream(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let booking = state
        .active
        .current()
        .ok_or_else(|| AppError::NotFound("no active booking".to_string()))?;

    if !StatusConfig::for_status(booking.status).trackable {
        return Err(AppError::Validation(
            "Tracking is available once a therapist is assigned".to_string(),
        ));
    }

    let tracker = TherapistTracker::start(state.bookings.as_ref(), state.location.as_ref(), &booking).await?;
    let initial = tracker.report();

    let updates = futures::stream::unfold(tracker, |mut tracker| async move {
        let report = tracker.next_report().await?;
        Some((report, tracker))
    });

    let reports = tokio_stream::once(initial)
        .chain(updates)
        .map(|report| report_event(&report));

    // The stream ends with the booking, so keepalives must not outlive it.
    Ok(Sse::new(reports).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    ))
}
