use std::sync::Arc;

use toolbridge_mcp::McpServer;

use crate::session::SessionManager;

/// Shared application state with injected dependencies.
#[derive(Clone)]
pub struct AppState {
    pub server: Arc<McpServer>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    #[must_use]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self {
            server,
            sessions: Arc::new(SessionManager::new()),
        }
    }
}
