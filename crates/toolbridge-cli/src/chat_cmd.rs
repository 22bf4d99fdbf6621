use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use toolbridge_agent::events::{self, AgentEvent};
use toolbridge_agent::{BridgeConfig, ChatCompletionsLoop, EchoLoop, LlmConfig, Session};
use toolbridge_core::{DecisionLoop, Error, ToolTransport};

/// Chat settings gathered from the command line.
pub struct ChatOptions {
    pub verbose: bool,
    pub mock: bool,
    pub llm_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub max_iterations: Option<NonZeroUsize>,
    pub system_prompt: Option<String>,
}

impl ChatOptions {
    fn decision_loop(&self) -> anyhow::Result<Arc<dyn DecisionLoop>> {
        if self.mock {
            tracing::info!("mock mode: echoing messages");
            return Ok(Arc::new(EchoLoop));
        }

        let mut config = LlmConfig::default();
        if let Some(url) = &self.llm_url {
            config.base_url.clone_from(url);
        }
        if let Some(model) = &self.model {
            config.model.clone_from(model);
        }
        if let Some(prompt) = &self.system_prompt {
            config.system_prompt.clone_from(prompt);
        }
        config.api_key.clone_from(&self.api_key);

        tracing::info!(url = %config.base_url, model = %config.model, "using LLM");
        Ok(Arc::new(ChatCompletionsLoop::new(config)?))
    }

    fn bridge_config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        if let Some(max) = self.max_iterations {
            config.max_iterations = max.get();
        }
        config
    }
}

/// Run the interactive chat loop until `exit`, end of input or Ctrl-C at the
/// prompt. Ctrl-C while a message is being answered cancels only that turn.
pub async fn run(transport: Arc<dyn ToolTransport>, options: ChatOptions) -> anyhow::Result<()> {
    let config = options.bridge_config();
    let (sink, rx) = events::channel(config.event_buffer);
    let observer = tokio::spawn(print_events(rx, options.verbose));

    let mut session = Session::connect(transport, options.decision_loop()?, config, sink).await?;
    for tool in session.tools() {
        println!("{} {}", tool.name, tool.description);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nEnter your message: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "exit" {
            break;
        }

        println!("User: {message}");
        let cancel = CancellationToken::new();
        let interrupt = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        let outcome = session.send_with_cancel(message, &cancel).await;
        interrupt.abort();

        match outcome {
            Ok(answer) => println!("Agent: {answer}"),
            Err(Error::Cancelled) => println!("(cancelled)"),
            Err(err) => eprintln!("Error: {err}"),
        }
    }

    session.close();
    let _ = observer.await;
    Ok(())
}

async fn print_events(mut rx: mpsc::Receiver<AgentEvent>, verbose: bool) {
    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::ToolCallStarted {
                tool, arguments, ..
            } if verbose => {
                println!("Calling tool {tool} with kwargs {}", serde_json::Value::Object(arguments));
            }
            AgentEvent::ToolCallFinished { tool, outcome, .. } if verbose => {
                println!("Tool {tool} returned {}", outcome.to_text());
            }
            AgentEvent::EventsDropped { count } => {
                tracing::warn!(count, "tool events were dropped");
            }
            _ => {}
        }
    }
}
