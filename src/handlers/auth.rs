use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Session, UserProfile};
use crate::services::auth::{self, SignUpOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session: Option<Session>,
}

// GET /api/auth/session
pub async fn current_session(State(state): State<Arc<AppState>>) -> Result<Json<SessionResponse>, AppError> {
    let session = state.sessions.get_current_session().await?;
    Ok(Json(SessionResponse { session }))
}

// GET /api/auth/profile
pub async fn profile(State(state): State<Arc<AppState>>) -> Result<Json<UserProfile>, AppError> {
    let session = state
        .sessions
        .get_current_session()
        .await?
        .ok_or(AppError::Unauthenticated)?;
    let profile = state
        .bookings
        .fetch_profile(session.user_id())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("profile {}", session.user_id())))?;
    Ok(Json(profile))
}

// POST /api/auth/sign-in
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Credentials>,
) -> Result<Json<Session>, AppError> {
    let session = auth::sign_in(state.sessions.as_ref(), &body.email, &body.password).await?;
    Ok(Json(session))
}

// POST /api/auth/sign-up
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Credentials>,
) -> Result<Json<SignUpOutcome>, AppError> {
    let outcome = auth::sign_up(
        state.sessions.as_ref(),
        state.bookings.as_ref(),
        &body.email,
        &body.password,
    )
    .await?;
    Ok(Json(outcome))
}

// POST /api/auth/sign-out
pub async fn sign_out(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, AppError> {
    state.sessions.sign_out().await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth::reset_password(state.sessions.as_ref(), &body.email).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
