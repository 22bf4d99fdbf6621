use std::time::Duration;

/// Tunables for an agent session.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Upper bound on decisions per turn.
    pub max_iterations: usize,
    /// Capacity of the event channel handed to observers.
    pub event_buffer: usize,
    /// Pause before the single retry of a tool call that hit a transport error.
    pub retry_backoff: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            event_buffer: 64,
            retry_backoff: Duration::from_millis(500),
        }
    }
}
