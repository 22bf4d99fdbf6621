use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use toolbridge_core::SessionId;
use toolbridge_mcp::JsonRpcResponse;

const SESSION_BUFFER: usize = 100;

/// Manages active SSE sessions for connected MCP clients.
pub struct SessionManager {
    /// Map of session id -> broadcast sender for SSE responses.
    sessions: RwLock<HashMap<SessionId, broadcast::Sender<Arc<JsonRpcResponse>>>>,
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Open a new session and return its id with a receiver for SSE events.
    pub fn open(&self) -> (SessionId, broadcast::Receiver<Arc<JsonRpcResponse>>) {
        let id = SessionId::new();
        let (sender, receiver) = broadcast::channel(SESSION_BUFFER);
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sender);
        (id, receiver)
    }

    /// Push a JSON-RPC response to a connected client.
    /// Returns true if the response was delivered to at least one listener.
    pub fn send(&self, id: SessionId, response: JsonRpcResponse) -> bool {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = sessions.get(&id) {
            sender.send(Arc::new(response)).is_ok()
        } else {
            false
        }
    }

    /// Remove a session when its client disconnects.
    pub fn remove(&self, id: SessionId) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Check if a session is open.
    pub fn is_connected(&self, id: SessionId) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes its session from the manager when dropped, i.e. when the SSE
/// stream holding it goes away.
pub struct SessionGuard {
    id: SessionId,
    sessions: Arc<SessionManager>,
}

impl SessionGuard {
    #[must_use]
    pub fn new(id: SessionId, sessions: Arc<SessionManager>) -> Self {
        Self { id, sessions }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        tracing::info!(session_id = %self.id, "SSE client disconnected");
        self.sessions.remove(self.id);
    }
}
