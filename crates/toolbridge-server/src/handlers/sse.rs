use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive},
    response::Sse,
};
use serde::Deserialize;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use toolbridge_core::SessionId;

use crate::app_state::AppState;
use crate::session::SessionGuard;

/// Query string of the POST endpoint announced to SSE clients.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub session_id: String,
}

/// SSE stream for an MCP client.
///
/// Per the MCP SSE transport:
/// 1. Server sends `event: endpoint` with the POST URL for this session
/// 2. Client POSTs JSON-RPC to that URL
/// 3. Server sends responses back via SSE `event: message`
pub async fn sse_connect(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let (session_id, rx) = state.sessions.open();
    tracing::info!(%session_id, "client connected via SSE");

    let endpoint = tokio_stream::once(Ok(Event::default()
        .event("endpoint")
        .data(format!("/messages?session_id={session_id}"))));

    let guard = SessionGuard::new(session_id, Arc::clone(&state.sessions));
    let responses = BroadcastStream::new(rx).filter_map(move |result| {
        let _session = &guard;
        result.ok().map(|response| {
            Ok(Event::default()
                .event("message")
                .json_data(&*response)
                .unwrap_or_else(|_| Event::default().data("error serializing response")))
        })
    });

    Sse::new(endpoint.chain(responses)).keep_alive(KeepAlive::default())
}

/// Accept a JSON-RPC message for an SSE session.
///
/// Returns `202 Accepted`; the response, if any, is delivered on the stream.
#[allow(clippy::missing_errors_doc)]
pub async fn sse_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Result<StatusCode, (StatusCode, String)> {
    let session_id: SessionId = query
        .session_id
        .parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid session_id: {e}")))?;

    if !state.sessions.is_connected(session_id) {
        return Err((
            StatusCode::NOT_FOUND,
            format!("Session not found: {session_id}"),
        ));
    }

    if let Some(response) = state.server.handle_message(&body) {
        if !state.sessions.send(session_id, response) {
            tracing::warn!(%session_id, "dropped response for disconnected session");
        }
    }

    Ok(StatusCode::ACCEPTED)
}
