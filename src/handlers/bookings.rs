use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::models::{Booking, PaymentMethod};
use crate::services::checkout;
use crate::services::lifecycle::ActiveBookingState;
use crate::services::status::{StatusConfig, StepIndicator};
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingDisplay {
    pub status: StatusConfig,
    pub step: StepIndicator,
    pub therapist_name: String,
}

#[derive(Serialize)]
pub struct ActiveBookingResponse {
    #[serde(flatten)]
    pub state: ActiveBookingState,
    pub display: Option<BookingDisplay>,
}

// GET /api/bookings/active
pub async fn active_booking(State(state): State<Arc<AppState>>) -> Json<ActiveBookingResponse> {
    let snapshot = state.active.snapshot();
    let display = snapshot.booking.as_ref().map(|b| BookingDisplay {
        status: StatusConfig::for_status(b.status),
        step: StepIndicator::for_status(b.status),
        therapist_name: b.therapist_display_name().to_string(),
    });
    Json(ActiveBookingResponse {
        state: snapshot,
        display,
    })
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub service_id: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

// POST /api/checkout
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let service = state
        .catalog
        .get_service_by_id(&body.service_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("service {}", body.service_id)))?;

    let booking = checkout::confirm_booking(
        state.sessions.as_ref(),
        state.bookings.as_ref(),
        state.location.as_ref(),
        &service,
        body.payment_method,
    )
    .await?;

    state.active.refresh().await;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/events (SSE)
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.active.subscribe_events();

    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event(event.name())))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Sse::new(StreamExt::merge(live_stream, keepalive_stream))
}
