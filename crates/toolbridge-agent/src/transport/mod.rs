//! Network transports that speak MCP to a remote tool server.

mod http;
mod sse;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use toolbridge_core::{
    Error, ResourceContents, ResourceTemplate, ToolCallRequest, ToolCallResult, ToolDescriptor,
    ToolTransport,
};
use toolbridge_mcp::{codec, JsonRpcRequest, JsonRpcResponse};

pub use http::HttpChannel;
pub use sse::SseChannel;

/// MCP over streamable HTTP: one POST per request.
pub type HttpTransport = McpClient<HttpChannel>;

/// MCP over the SSE transport: responses arrive on a long-lived event stream.
pub type SseTransport = McpClient<SseChannel>;

const CLIENT_NAME: &str = "toolbridge";

/// Moves one JSON-RPC exchange over the wire.
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Send a request and wait for the response with the same id.
    async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, Error>;

    /// Send a notification; no response is expected.
    async fn notify(&self, request: &JsonRpcRequest) -> Result<(), Error>;
}

/// MCP client over any [`RpcChannel`].
#[derive(Debug)]
pub struct McpClient<C> {
    channel: C,
    next_id: AtomicU64,
}

impl<C: RpcChannel> McpClient<C> {
    /// Wrap a channel and perform the MCP initialize handshake.
    pub async fn handshake(channel: C) -> Result<Self, Error> {
        let client = Self {
            channel,
            next_id: AtomicU64::new(1),
        };

        let result = client
            .channel
            .request(&codec::initialize(client.next_id(), CLIENT_NAME))
            .await?
            .into_result()
            .map_err(|err| Error::Protocol(format!("initialize rejected: {err}")))?;
        let server = result
            .pointer("/serverInfo/name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        client.channel.notify(&codec::initialized()).await?;

        tracing::info!(%server, "MCP session initialized");
        Ok(client)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl<C: RpcChannel> ToolTransport for McpClient<C> {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, Error> {
        let response = self.channel.request(&codec::list_tools(self.next_id())).await?;
        codec::decode_tool_list(response)
    }

    async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, Error> {
        let response = self
            .channel
            .request(&codec::call_tool(self.next_id(), request))
            .await?;
        codec::decode_call_result(request, response)
    }

    async fn list_resource_templates(&self) -> Result<Vec<ResourceTemplate>, Error> {
        let response = self
            .channel
            .request(&codec::list_resource_templates(self.next_id()))
            .await?;
        codec::decode_resource_templates(response)
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, Error> {
        let response = self
            .channel
            .request(&codec::read_resource(self.next_id(), uri))
            .await?;
        codec::decode_resource_contents(response)
    }
}

/// Which wire protocol to use when connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Sse,
    Http,
}

/// Connect to the server at `base_url` (e.g. `http://127.0.0.1:8000`).
pub async fn connect(kind: TransportKind, base_url: &str) -> Result<Arc<dyn ToolTransport>, Error> {
    let transport: Arc<dyn ToolTransport> = match kind {
        TransportKind::Sse => Arc::new(SseTransport::handshake(SseChannel::open(base_url).await?).await?),
        TransportKind::Http => Arc::new(HttpTransport::handshake(HttpChannel::new(base_url)?).await?),
    };
    Ok(transport)
}

fn transport_error(err: &reqwest::Error) -> Error {
    Error::Transport(err.to_string())
}
