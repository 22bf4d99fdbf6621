pub mod error;
pub mod traits;
pub mod types;

pub use error::Error;
pub use traits::{DecisionLoop, ToolTransport};
pub use types::{
    Arguments, ConversationContext, ConversationEntry, Decision, EntryKind, ParamSpec, ParamType,
    ResourceContents, ResourceTemplate, SessionId, ToolCallRequest, ToolCallResult,
    ToolDescriptor, ToolError, ToolErrorKind, ToolOutcome,
};
