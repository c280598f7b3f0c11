use axum::{
    extract::{Path, State},
    response::Json,
};

use super::AppState;
use crate::api::models::{AcknowledgeResponse, Alert, AlertStatsResponse};
use crate::error::Result;

/// GET /api/alerts
/// Most recent alerts, newest first
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Alert>>> {
    let alerts = state.alerts.recent().await?;
    Ok(Json(alerts))
}

/// GET /api/alerts/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<AlertStatsResponse>> {
    let stats = state.alerts.stats().await?;
    Ok(Json(stats))
}

/// PUT /api/alerts/{id}/acknowledge
pub async fn acknowledge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AcknowledgeResponse>> {
    let alert = state.alerts.acknowledge(&id).await?;

    Ok(Json(AcknowledgeResponse {
        message: "Alert acknowledged".to_string(),
        alert,
    }))
}
