use crate::types::{ToolError, ToolErrorKind};

/// Core error type for the toolbridge system.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tool already registered: {0}")]
    DuplicateName(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for '{tool}': {reason}")]
    Validation { tool: String, reason: String },

    #[error("tool '{tool}' failed: {message}")]
    Handler { tool: String, message: String },

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("decision loop error: {0}")]
    Decision(String),

    #[error("turn exceeded {0} decision iterations")]
    IterationLimit(usize),

    #[error("turn cancelled")]
    Cancelled,

    #[error("session closed")]
    SessionClosed,
}

impl Error {
    /// The error descriptor handed back to the decision loop for errors that
    /// are recoverable at invocation time. `None` for everything else.
    #[must_use]
    pub fn to_tool_error(&self) -> Option<ToolError> {
        let kind = match self {
            Self::UnknownTool(_) => ToolErrorKind::UnknownTool,
            Self::Validation { .. } => ToolErrorKind::Validation,
            Self::Handler { .. } => ToolErrorKind::Handler,
            _ => return None,
        };
        let message = match self {
            Self::Handler { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Some(ToolError { kind, message })
    }

    /// Whether a retry on the same transport could plausibly succeed.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
