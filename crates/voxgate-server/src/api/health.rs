//! Health check endpoint

use axum::{extract::State, Json};
use voxgate_core::HealthReport;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.gateway.health())
}
