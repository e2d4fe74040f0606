//! Read-only status endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use threadrelay_protocol::{HealthResponse, MappingsDump};

use crate::state::AppState;

/// `GET /health`
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        mapped_issues: state.directory.len(),
        cached_states: state.states.len(),
        timestamp: Utc::now(),
    })
}

/// `GET /debug/mappings`: every link and cached state, sorted by issue id.
pub async fn mappings_handler(State(state): State<Arc<AppState>>) -> Json<MappingsDump> {
    Json(MappingsDump {
        mappings: state.directory.entries(),
        states: state.states.entries(),
    })
}
