use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use toolbridge_core::{
    ConversationContext, Decision, DecisionLoop, Error, ParamSpec, ParamType, ToolCallRequest,
    ToolCallResult, ToolDescriptor, ToolTransport,
};

pub fn sum_tool() -> ToolDescriptor {
    ToolDescriptor {
        name: "sum".to_string(),
        description: "Add two numbers".to_string(),
        params: ["a", "b"]
            .into_iter()
            .map(|name| ParamSpec {
                name: name.to_string(),
                ty: ParamType::Integer,
                required: true,
                description: None,
            })
            .collect(),
        schema: None,
    }
}

pub fn call(tool: &str, arguments: serde_json::Value) -> Decision {
    let arguments = arguments.as_object().cloned().unwrap_or_default();
    Decision::CallTool(ToolCallRequest::new(tool, arguments))
}

/// Decision loop that replays a fixed script, then answers "done".
#[derive(Default)]
pub struct ScriptedLoop {
    script: Mutex<VecDeque<Decision>>,
    decisions: AtomicUsize,
}

impl ScriptedLoop {
    pub fn new(script: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            decisions: AtomicUsize::new(0),
        }
    }

    /// A loop that makes the same decision `times` times.
    pub fn repeating(decision: &Decision, times: usize) -> Self {
        Self::new((0..times).map(|_| decision.clone()))
    }

    pub fn decisions(&self) -> usize {
        self.decisions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionLoop for ScriptedLoop {
    async fn decide(
        &self,
        _context: &ConversationContext,
        _tools: &[ToolDescriptor],
    ) -> Result<Decision, Error> {
        self.decisions.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| Decision::FinalAnswer("done".to_string())))
    }
}

/// Transport whose tool list cannot be fetched.
pub struct FailingTransport;

#[async_trait]
impl ToolTransport for FailingTransport {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, Error> {
        Err(Error::Transport("connection refused".to_string()))
    }

    async fn call_tool(&self, _request: &ToolCallRequest) -> Result<ToolCallResult, Error> {
        Err(Error::Transport("connection refused".to_string()))
    }
}

/// Transport whose first `failures` tool calls hit a transport error.
pub struct FlakyTransport {
    failures: usize,
    attempts: AtomicUsize,
}

impl FlakyTransport {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolTransport for FlakyTransport {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, Error> {
        Ok(vec![sum_tool()])
    }

    async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, Error> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(Error::Transport("connection reset".to_string()));
        }
        Ok(ToolCallResult::output(request, json!(5)))
    }
}

/// Transport whose tool calls take effect immediately but answer slowly.
#[derive(Default)]
pub struct SlowTransport {
    effects: AtomicUsize,
}

impl SlowTransport {
    pub fn effects(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolTransport for SlowTransport {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, Error> {
        Ok(vec![sum_tool()])
    }

    async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, Error> {
        self.effects.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(ToolCallResult::output(request, json!(5)))
    }
}
