use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app_state::AppState;

/// Liveness plus a summary of what the server exposes.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "server": state.server.name(),
        "tools": state.server.tools().len(),
        "sse_sessions": state.sessions.len(),
    }))
}
