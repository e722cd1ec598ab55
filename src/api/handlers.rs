//! Request handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;
use crate::gateway::{GenerationRequest, GenerationResponse, StageFailure};
use crate::AppState;

/// `POST /generate`
pub async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>, StageFailure> {
    let Json(request) = payload.map_err(|rejection| {
        state.orchestrator.reject(AppError::InvalidRequest(rejection.body_text()))
    })?;

    state.orchestrator.process(request).await.map(Json)
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub pipeline: String,
    pub inferences: u64,
    pub failures: u64,
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let gateway = state.gateway();
    let stats = gateway.stats();

    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.settings.model.checkpoint.clone(),
        pipeline: gateway.pipeline_name().to_string(),
        inferences: stats.completed,
        failures: stats.failed,
    })
}
