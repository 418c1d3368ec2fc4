//! Backend-side controls for local runs: drive a booking through its
//! lifecycle the way a dispatcher or therapist app would.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::backend::local::LocalBackend;
use crate::models::{Booking, BookingStatus, Coordinate};
use crate::state::AppState;

#[allow(clippy::result_large_err)]
fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), Response> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        )
            .into_response());
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
fn dev_backend<'a>(state: &'a AppState, headers: &HeaderMap) -> Result<&'a LocalBackend, Response> {
    check_auth(headers, &state.config.dev_token)?;
    state.dev.as_deref().ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "dev controls require the local backend"})),
        )
            .into_response()
    })
}

fn respond(result: Result<Booking, crate::errors::AppError>) -> Response {
    match result {
        Ok(booking) => Json(booking).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: String,
}

// POST /api/dev/bookings/:id/status
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Response, Response> {
    let backend = dev_backend(&state, &headers)?;

    let status = BookingStatus::parse(&body.status);
    if status == BookingStatus::Unknown {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": format!("unknown status: {}", body.status)})),
        )
            .into_response());
    }

    Ok(respond(backend.set_status(&id, status)))
}

#[derive(Deserialize)]
pub struct TherapistBody {
    pub therapist_id: String,
    pub therapist_name: String,
}

// POST /api/dev/bookings/:id/therapist
pub async fn assign_therapist(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TherapistBody>,
) -> Result<Response, Response> {
    let backend = dev_backend(&state, &headers)?;
    Ok(respond(backend.assign_therapist(
        &id,
        &body.therapist_id,
        &body.therapist_name,
    )))
}

// POST /api/dev/bookings/:id/location
pub async fn update_location(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Coordinate>,
) -> Result<Response, Response> {
    let backend = dev_backend(&state, &headers)?;
    Ok(respond(backend.update_therapist_location(&id, body)))
}
