pub mod codec;
pub mod jsonrpc;
pub mod registry;
pub mod resources;
pub mod server;
mod validate;

pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use registry::{ToolBuilder, ToolHandler, ToolRegistry};
pub use resources::{ResourceHandler, ResourceRegistry};
pub use server::McpServer;
