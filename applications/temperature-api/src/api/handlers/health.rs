use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::AppState;

/// GET /health
/// Liveness check. Stays 200 while the process serves requests; the body
/// reports whether the store answers.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let connected = state.store.ping().await;
    if !connected {
        tracing::warn!(backend = state.store.backend_name(), "store is not reachable");
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "database": {
                "backend": state.store.backend_name(),
                "connected": connected,
            }
        })),
    )
}
