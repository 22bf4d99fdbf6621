use async_trait::async_trait;

use crate::error::Error;
use crate::types::{
    ConversationContext, Decision, ResourceContents, ResourceTemplate, ToolCallRequest,
    ToolCallResult, ToolDescriptor,
};

/// Request/response channel to a tool registry.
///
/// `Err` is reserved for failures of the channel itself (`Transport`,
/// `Protocol`). Unknown tools, bad arguments and handler failures come back
/// as a [`ToolCallResult`] carrying an error descriptor.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Fetch the registry's tools in registration order (`ListTools`).
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, Error>;

    /// Run one tool (`CallTool`).
    async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, Error>;

    /// List the resource templates the server advertises.
    async fn list_resource_templates(&self) -> Result<Vec<ResourceTemplate>, Error> {
        Err(Error::Protocol("resources are not supported by this transport".to_string()))
    }

    /// Read a resource by concrete URI.
    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, Error> {
        Err(Error::Protocol(format!(
            "cannot read '{uri}': resources are not supported by this transport"
        )))
    }
}

/// The model-driven process that picks the next step of a turn.
#[async_trait]
pub trait DecisionLoop: Send + Sync {
    /// Given the conversation so far and the available tools, either choose a
    /// tool call or produce the final answer for the turn.
    async fn decide(
        &self,
        context: &ConversationContext,
        tools: &[ToolDescriptor],
    ) -> Result<Decision, Error>;
}
