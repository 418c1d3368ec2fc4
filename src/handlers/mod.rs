pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod dev;
pub mod health;
pub mod tracking;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/services", get(catalog::list_services))
        .route("/api/services/featured", get(catalog::featured))
        .route("/api/services/:id", get(catalog::get_service))
        .route("/api/auth/session", get(auth::current_session))
        .route("/api/auth/profile", get(auth::profile))
        .route("/api/auth/sign-in", post(auth::sign_in))
        .route("/api/auth/sign-up", post(auth::sign_up))
        .route("/api/auth/sign-out", post(auth::sign_out))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/bookings/active", get(bookings::active_booking))
        .route("/api/bookings/events", get(bookings::events_stream))
        .route("/api/checkout", post(bookings::checkout))
        .route("/api/tracking", get(tracking::tracking_stream))
        .route("/api/dev/bookings/:id/status", post(dev::set_status))
        .route("/api/dev/bookings/:id/therapist", post(dev::assign_therapist))
        .route("/api/dev/bookings/:id/location", post(dev::update_location))
        .with_state(state)
}
