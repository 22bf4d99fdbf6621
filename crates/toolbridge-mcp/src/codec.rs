//! Client-side encoding of MCP requests and decoding of their responses.
//!
//! Shared by every network transport so they agree on how `tools/call`
//! results and errors map onto [`ToolCallResult`].

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use toolbridge_core::{
    Error, ResourceContents, ResourceTemplate, ToolCallRequest, ToolCallResult, ToolDescriptor,
    ToolError, ToolErrorKind,
};

use crate::jsonrpc::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, RESOURCE_NOT_FOUND,
};
use crate::server::PROTOCOL_VERSION;

pub fn initialize(id: u64, client_name: &str) -> JsonRpcRequest {
    JsonRpcRequest::new(
        id,
        "initialize",
        Some(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": client_name,
                "version": env!("CARGO_PKG_VERSION")
            }
        })),
    )
}

pub fn initialized() -> JsonRpcRequest {
    JsonRpcRequest::notification("notifications/initialized", None)
}

pub fn list_tools(id: u64) -> JsonRpcRequest {
    JsonRpcRequest::new(id, "tools/list", Some(json!({})))
}

pub fn call_tool(id: u64, request: &ToolCallRequest) -> JsonRpcRequest {
    JsonRpcRequest::new(
        id,
        "tools/call",
        Some(json!({
            "name": request.tool,
            "arguments": request.arguments,
        })),
    )
}

pub fn list_resource_templates(id: u64) -> JsonRpcRequest {
    JsonRpcRequest::new(id, "resources/templates/list", Some(json!({})))
}

pub fn read_resource(id: u64, uri: &str) -> JsonRpcRequest {
    JsonRpcRequest::new(id, "resources/read", Some(json!({ "uri": uri })))
}

/// Decode a `tools/list` response.
pub fn decode_tool_list(response: JsonRpcResponse) -> Result<Vec<ToolDescriptor>, Error> {
    field(into_result(response)?, "tools")
}

pub fn decode_resource_templates(response: JsonRpcResponse) -> Result<Vec<ResourceTemplate>, Error> {
    field(into_result(response)?, "resourceTemplates")
}

pub fn decode_resource_contents(response: JsonRpcResponse) -> Result<Vec<ResourceContents>, Error> {
    match response.into_result() {
        Ok(result) => field(result, "contents"),
        Err(err) if err.code == RESOURCE_NOT_FOUND => {
            let uri = err
                .data
                .as_ref()
                .and_then(|d| d.get("uri"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Err(Error::UnknownResource(uri.to_string()))
        }
        Err(err) => Err(protocol_error(&err)),
    }
}

/// Decode a `tools/call` response into a result for `request`.
///
/// Protocol-level failures (method missing, malformed request) are errors;
/// everything the server reports about the tool itself becomes an in-band
/// [`ToolError`].
pub fn decode_call_result(
    request: &ToolCallRequest,
    response: JsonRpcResponse,
) -> Result<ToolCallResult, Error> {
    let result = match response.into_result() {
        Ok(result) => result,
        Err(err) if err.is_protocol() => return Err(protocol_error(&err)),
        Err(err) => return Ok(ToolCallResult::failed(request, tool_error(err))),
    };

    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        return Ok(ToolCallResult::failed(
            request,
            ToolError {
                kind: ToolErrorKind::Handler,
                message: text,
            },
        ));
    }

    let value = match result.get("structuredContent") {
        Some(structured) => structured.get("result").cloned().unwrap_or_else(|| structured.clone()),
        None => serde_json::from_str(&text).unwrap_or(Value::String(text)),
    };
    Ok(ToolCallResult::output(request, value))
}

fn tool_error(err: JsonRpcError) -> ToolError {
    let described = err
        .data
        .as_ref()
        .and_then(|data| serde_json::from_value::<ToolError>(data.clone()).ok());
    if let Some(descriptor) = described {
        return descriptor;
    }

    let kind = match err.code {
        INVALID_PARAMS if err.message.to_lowercase().contains("unknown tool") => {
            ToolErrorKind::UnknownTool
        }
        INVALID_PARAMS => ToolErrorKind::Validation,
        _ => ToolErrorKind::Handler,
    };
    ToolError {
        kind,
        message: err.message,
    }
}

fn protocol_error(err: &JsonRpcError) -> Error {
    Error::Protocol(err.to_string())
}

fn into_result(response: JsonRpcResponse) -> Result<Value, Error> {
    response.into_result().map_err(|err| protocol_error(&err))
}

fn field<T: DeserializeOwned>(mut result: Value, name: &str) -> Result<T, Error> {
    let value = result
        .get_mut(name)
        .map(Value::take)
        .ok_or_else(|| Error::Protocol(format!("result is missing '{name}'")))?;
    serde_json::from_value(value).map_err(|e| Error::Protocol(format!("malformed '{name}': {e}")))
}
