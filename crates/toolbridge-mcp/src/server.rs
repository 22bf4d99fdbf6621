use async_trait::async_trait;
use serde_json::{json, Value};

use toolbridge_core::{
    Arguments, Error, ResourceContents, ResourceTemplate, ToolCallRequest, ToolCallResult,
    ToolDescriptor, ToolTransport,
};

use crate::jsonrpc::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS,
    METHOD_NOT_FOUND, PARSE_ERROR, RESOURCE_NOT_FOUND,
};
use crate::registry::ToolRegistry;
use crate::resources::ResourceRegistry;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP method dispatcher over a tool registry and a resource registry.
///
/// Transport-agnostic: the HTTP, SSE and stdio front ends all feed requests
/// through [`McpServer::handle`].
pub struct McpServer {
    name: String,
    tools: ToolRegistry,
    resources: ResourceRegistry,
}

impl McpServer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: ToolRegistry::new(),
            resources: ResourceRegistry::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Handle one raw JSON-RPC message. Unparseable input yields a parse
    /// error with a null id.
    pub fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(raw) {
            Ok(req) => self.handle(&req),
            Err(e) => Some(JsonRpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {e}"),
            )),
        }
    }

    /// Handle a request. Returns `None` for notifications.
    pub fn handle(&self, req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        if req.is_notification() {
            tracing::debug!("Received MCP notification: {}", req.method);
            return None;
        }

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => JsonRpcResponse::success(req.id.clone(), json!({})),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(req),
            "resources/list" => JsonRpcResponse::success(req.id.clone(), json!({ "resources": [] })),
            "resources/templates/list" => self.handle_templates_list(req),
            "resources/read" => self.handle_resources_read(req),
            _ => JsonRpcResponse::error(req.id.clone(), METHOD_NOT_FOUND, "Method not found"),
        };
        Some(response)
    }

    fn handle_initialize(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(
            req.id.clone(),
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                    "resources": {}
                },
                "serverInfo": {
                    "name": self.name,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let tools = self.tools.list();
        JsonRpcResponse::success(req.id.clone(), json!({ "tools": tools }))
    }

    fn handle_tools_call(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let Some(params) = &req.params else {
            return JsonRpcResponse::error(req.id.clone(), INVALID_PARAMS, "Missing params");
        };

        let Some(tool_name) = req.param_str("name") else {
            return JsonRpcResponse::error(req.id.clone(), INVALID_PARAMS, "Missing 'name' parameter");
        };

        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => Arguments::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return JsonRpcResponse::error(
                    req.id.clone(),
                    INVALID_PARAMS,
                    "'arguments' must be an object",
                )
            }
        };

        match self.tools.invoke(tool_name, &arguments) {
            Ok(value) => JsonRpcResponse::success(
                req.id.clone(),
                json!({
                    "content": [{ "type": "text", "text": render(&value) }],
                    "structuredContent": { "result": value },
                    "isError": false
                }),
            ),
            // Execution failures are reported in-band so the model can see them.
            Err(Error::Handler { message, .. }) => JsonRpcResponse::success(
                req.id.clone(),
                json!({
                    "content": [{ "type": "text", "text": message }],
                    "isError": true
                }),
            ),
            Err(err) => {
                let error = match err.to_tool_error().and_then(|e| serde_json::to_value(e).ok()) {
                    Some(data) => JsonRpcError::new(INVALID_PARAMS, err.to_string()).with_data(data),
                    None => JsonRpcError::new(INTERNAL_ERROR, err.to_string()),
                };
                JsonRpcResponse::failure(req.id.clone(), error)
            }
        }
    }

    fn handle_templates_list(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let templates = self.resources.templates();
        JsonRpcResponse::success(req.id.clone(), json!({ "resourceTemplates": templates }))
    }

    fn handle_resources_read(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let Some(uri) = req.param_str("uri") else {
            return JsonRpcResponse::error(req.id.clone(), INVALID_PARAMS, "Missing 'uri' parameter");
        };

        match self.resources.read(uri) {
            Ok(contents) => JsonRpcResponse::success(req.id.clone(), json!({ "contents": [contents] })),
            Err(err @ Error::UnknownResource(_)) => JsonRpcResponse::failure(
                req.id.clone(),
                JsonRpcError::new(RESOURCE_NOT_FOUND, err.to_string()).with_data(json!({ "uri": uri })),
            ),
            Err(err) => JsonRpcResponse::error(req.id.clone(), INTERNAL_ERROR, err.to_string()),
        }
    }
}

/// Text rendering of a tool result: strings verbatim, everything else as JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// In-process transport: the bridge talks to the registry without a network
/// hop.
#[async_trait]
impl ToolTransport for McpServer {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, Error> {
        Ok(self.tools.list())
    }

    async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, Error> {
        match self.tools.invoke(&request.tool, &request.arguments) {
            Ok(value) => Ok(ToolCallResult::output(request, value)),
            Err(err) => match err.to_tool_error() {
                Some(descriptor) => Ok(ToolCallResult::failed(request, descriptor)),
                None => Err(err),
            },
        }
    }

    async fn list_resource_templates(&self) -> Result<Vec<ResourceTemplate>, Error> {
        Ok(self.resources.templates())
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, Error> {
        self.resources.read(uri).map(|contents| vec![contents])
    }
}
