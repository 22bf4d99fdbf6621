use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::app_state::AppState;

/// Handle a JSON-RPC request over streamable HTTP.
///
/// The response is returned in the body; notifications get `202 Accepted`.
pub async fn mcp_request(State(state): State<AppState>, body: String) -> Response {
    match state.server.handle_message(&body) {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
