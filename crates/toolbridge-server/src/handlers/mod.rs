mod health;
mod mcp;
mod sse;

pub use health::health;
pub use mcp::mcp_request;
pub use sse::{sse_connect, sse_message};
