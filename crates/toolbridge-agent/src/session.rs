use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use toolbridge_core::{
    ConversationContext, Decision, DecisionLoop, EntryKind, Error, SessionId, ToolCallRequest,
    ToolCallResult, ToolDescriptor, ToolTransport,
};

use crate::config::BridgeConfig;
use crate::events::{AgentEvent, EventSink};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingToolList,
    Ready,
    Deciding,
    AwaitingToolResult,
    Responding,
    Terminated,
}

/// One agent session: a conversation, the tools discovered for it, and the
/// sequential decision loop that drives each turn.
///
/// Turns take `&mut self`, so a session never has more than one turn (and
/// therefore more than one tool call) in flight.
pub struct Session {
    id: SessionId,
    transport: Arc<dyn ToolTransport>,
    decider: Arc<dyn DecisionLoop>,
    config: BridgeConfig,
    tools: Vec<ToolDescriptor>,
    context: ConversationContext,
    events: EventSink,
    state: SessionState,
}

impl Session {
    /// Discover the transport's tools and return a ready session.
    ///
    /// Fails if the tool list cannot be fetched; there is no session without
    /// one.
    pub async fn connect(
        transport: Arc<dyn ToolTransport>,
        decider: Arc<dyn DecisionLoop>,
        config: BridgeConfig,
        events: EventSink,
    ) -> Result<Self, Error> {
        let mut session = Self {
            id: SessionId::new(),
            transport,
            decider,
            config,
            tools: Vec::new(),
            context: ConversationContext::new(),
            events,
            state: SessionState::Idle,
        };

        session.transition(SessionState::AwaitingToolList);
        session.tools = session.transport.list_tools().await.inspect_err(|e| {
            tracing::error!(session_id = %session.id, "tool discovery failed: {e}");
        })?;
        tracing::info!(
            session_id = %session.id,
            tools = session.tools.len(),
            "discovered tools"
        );
        session.transition(SessionState::Ready);

        Ok(session)
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Tools discovered at connect time, in the registry's order.
    #[must_use]
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    #[must_use]
    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Run one turn to completion.
    pub async fn send(&mut self, message: &str) -> Result<String, Error> {
        self.send_with_cancel(message, &CancellationToken::new()).await
    }

    /// Run one turn, abandoning it if `cancel` fires.
    ///
    /// Errors end the turn, not the session: they are recorded as a notice in
    /// the conversation and the session returns to `Ready`. A cancelled tool
    /// call may still have taken effect on the server; its result is
    /// discarded.
    pub async fn send_with_cancel(
        &mut self,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        if self.state == SessionState::Terminated {
            return Err(Error::SessionClosed);
        }

        self.context.append(EntryKind::User(message.to_string()));

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = self.run_turn() => result,
        };

        match &outcome {
            Ok(_) => {}
            Err(Error::Cancelled) => {
                tracing::info!(session_id = %self.id, "turn cancelled");
                self.context
                    .append(EntryKind::Notice("turn cancelled".to_string()));
                self.events.emit(AgentEvent::TurnCancelled);
            }
            Err(err) => {
                tracing::warn!(session_id = %self.id, "turn failed: {err}");
                self.context
                    .append(EntryKind::Notice(format!("turn failed: {err}")));
            }
        }
        self.transition(SessionState::Ready);

        outcome
    }

    /// End the session. Later turns fail with [`Error::SessionClosed`] and the
    /// event observer sees its channel close.
    pub fn close(&mut self) {
        self.transition(SessionState::Terminated);
        self.events.close();
    }

    async fn run_turn(&mut self) -> Result<String, Error> {
        for _ in 0..self.config.max_iterations {
            self.transition(SessionState::Deciding);
            let decision = self.decider.decide(&self.context, &self.tools).await?;

            match decision {
                Decision::FinalAnswer(answer) => {
                    self.transition(SessionState::Responding);
                    self.context.append(EntryKind::Assistant(answer.clone()));
                    return Ok(answer);
                }
                Decision::CallTool(request) => {
                    self.transition(SessionState::AwaitingToolResult);
                    self.context.append(EntryKind::ToolCall(request.clone()));
                    self.events.emit(AgentEvent::ToolCallStarted {
                        call_id: request.id.clone(),
                        tool: request.tool.clone(),
                        arguments: request.arguments.clone(),
                    });

                    let result = self.invoke(&request).await?;

                    self.events.emit(AgentEvent::ToolCallFinished {
                        call_id: result.call_id.clone(),
                        tool: result.tool.clone(),
                        outcome: result.outcome.clone(),
                    });
                    self.context.append(EntryKind::ToolResult(result));
                }
            }
        }

        Err(Error::IterationLimit(self.config.max_iterations))
    }

    /// Call a tool, retrying once after a backoff if the transport fails.
    async fn invoke(&self, request: &ToolCallRequest) -> Result<ToolCallResult, Error> {
        tracing::debug!(session_id = %self.id, tool = %request.tool, call_id = %request.id, "calling tool");

        match self.transport.call_tool(request).await {
            Err(err) if err.is_transport() => {
                tracing::warn!(
                    session_id = %self.id,
                    tool = %request.tool,
                    "tool call failed ({err}), retrying in {:?}",
                    self.config.retry_backoff
                );
                tokio::time::sleep(self.config.retry_backoff).await;
                self.transport.call_tool(request).await
            }
            other => other,
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(session_id = %self.id, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("tools", &self.tools.len())
            .field("entries", &self.context.len())
            .finish_non_exhaustive()
    }
}
