//! Decision loops: an OpenAI-compatible chat completions client and an
//! offline echo loop.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use toolbridge_core::{
    Arguments, ConversationContext, Decision, DecisionLoop, EntryKind, Error, ToolCallRequest,
    ToolDescriptor,
};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant for Tool Calling.

Before you help a user, you need to work with tools to interact with Our Database";

/// Connection settings for an OpenAI-compatible endpoint (Ollama, vLLM, ...).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL, e.g. `http://localhost:11434/v1`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub system_prompt: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Decision loop backed by `POST {base_url}/chat/completions` with function
/// calling.
#[derive(Debug, Clone)]
pub struct ChatCompletionsLoop {
    client: Client,
    config: LlmConfig,
}

impl ChatCompletionsLoop {
    pub fn new(config: LlmConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Decision(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Build the request body for the current conversation.
    #[must_use]
    pub fn request_body(&self, context: &ConversationContext, tools: &[ToolDescriptor]) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages(&self.config.system_prompt, context),
            "stream": false,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(function_spec).collect());
        }
        body
    }
}

#[async_trait]
impl DecisionLoop for ChatCompletionsLoop {
    async fn decide(
        &self,
        context: &ConversationContext,
        tools: &[ToolDescriptor],
    ) -> Result<Decision, Error> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut request = self.client.post(url).json(&self.request_body(context, tools));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| Error::Decision(format!("LLM request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Decision(format!("LLM returned HTTP {status}: {body}")));
        }

        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| Error::Decision(format!("LLM response is not JSON: {e}")))?;
        parse_decision(&body)
    }
}

/// Translate the conversation into chat messages.
fn messages(system_prompt: &str, context: &ConversationContext) -> Vec<Value> {
    let mut messages = vec![json!({ "role": "system", "content": system_prompt })];
    let entries: Vec<&EntryKind> = context.iter().collect();

    for (index, entry) in entries.iter().enumerate() {
        match entry {
            EntryKind::User(text) => messages.push(json!({ "role": "user", "content": text })),
            EntryKind::Assistant(text) => {
                messages.push(json!({ "role": "assistant", "content": text }));
            }
            EntryKind::ToolCall(call) => {
                messages.push(json!({
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.tool,
                            "arguments": Value::Object(call.arguments.clone()).to_string(),
                        }
                    }]
                }));
                // Every tool call needs an answer; a cancelled or failed one
                // never got a result entry.
                if !answered(&entries[index + 1..], &call.id) {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": call.id,
                        "content": "No result: the call was abandoned.",
                    }));
                }
            }
            EntryKind::ToolResult(result) => messages.push(json!({
                "role": "tool",
                "tool_call_id": result.call_id,
                "content": result.outcome.to_text(),
            })),
            EntryKind::Notice(_) => {}
        }
    }

    messages
}

/// Whether a tool call is followed by its result. The result is recorded
/// right after the call, with only notices in between; ids alone are not
/// enough since models may reuse them across turns.
fn answered(rest: &[&EntryKind], call_id: &str) -> bool {
    let next = rest
        .iter()
        .find(|entry| !matches!(entry, EntryKind::Notice(_)));
    matches!(next, Some(EntryKind::ToolResult(result)) if result.call_id == call_id)
}

fn function_spec(tool: &ToolDescriptor) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema(),
        }
    })
}

/// Read the first choice of a chat completion as a decision. Only the first
/// tool call is taken; a turn runs one call at a time.
pub fn parse_decision(body: &Value) -> Result<Decision, Error> {
    let message = body
        .pointer("/choices/0/message")
        .ok_or_else(|| Error::Decision(format!("LLM response has no choices: {body}")))?;

    let calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .filter(|calls| !calls.is_empty());

    let Some(calls) = calls else {
        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Ok(Decision::FinalAnswer(content.to_string()));
    };

    if calls.len() > 1 {
        tracing::debug!(count = calls.len(), "model proposed several tool calls, taking the first");
    }
    let call = &calls[0];
    let name = call
        .pointer("/function/name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Decision("tool call without a function name".to_string()))?;

    let arguments = match call.pointer("/function/arguments") {
        None | Some(Value::Null) => Arguments::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) if raw.trim().is_empty() => Arguments::new(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(Error::Decision(format!(
                    "arguments for '{name}' are not an object: {other}"
                )))
            }
            Err(e) => {
                return Err(Error::Decision(format!(
                    "arguments for '{name}' are not valid JSON: {e}"
                )))
            }
        },
        Some(other) => {
            return Err(Error::Decision(format!(
                "arguments for '{name}' are not an object: {other}"
            )))
        }
    };

    let mut request = ToolCallRequest::new(name, arguments);
    if let Some(id) = call.get("id").and_then(Value::as_str) {
        request = request.with_id(id);
    }
    Ok(Decision::CallTool(request))
}

/// Offline decision loop: answers every message with `Echo: <message>` and
/// never calls a tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoLoop;

#[async_trait]
impl DecisionLoop for EchoLoop {
    async fn decide(
        &self,
        context: &ConversationContext,
        _tools: &[ToolDescriptor],
    ) -> Result<Decision, Error> {
        let last_user = context
            .iter()
            .filter_map(|entry| match entry {
                EntryKind::User(text) => Some(text.as_str()),
                _ => None,
            })
            .last()
            .unwrap_or_default();
        Ok(Decision::FinalAnswer(format!("Echo: {last_user}")))
    }
}
