use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::app_state::AppState;
use crate::handlers;

/// Create the main application router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Legacy SSE transport: GET opens the stream, POSTs go to the endpoint it announces.
        .route("/sse", get(handlers::sse_connect))
        .route("/messages", post(handlers::sse_message))
        // Streamable HTTP: the response comes back in the POST body.
        .route("/mcp", post(handlers::mcp_request))
        // CORS: allow any origin (MCP clients may run in various contexts)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
