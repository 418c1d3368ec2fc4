use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::errors::AppError;
use crate::models::Service;
use crate::services::catalog::featured_services;
use crate::state::AppState;

// GET /api/services
pub async fn list_services(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Service>>, AppError> {
    Ok(Json(state.catalog.list_active_services().await?))
}

// GET /api/services/featured
pub async fn featured(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Service>>, AppError> {
    let services = state.catalog.list_active_services().await?;
    Ok(Json(featured_services(&services)))
}

// GET /api/services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Service>, AppError> {
    state
        .catalog
        .get_service_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("service {id}")))
}
