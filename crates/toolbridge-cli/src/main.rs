use std::num::NonZeroUsize;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use toolbridge_agent::transport::{self, TransportKind};

mod chat_cmd;
mod tools_cmd;

#[derive(Parser)]
#[command(name = "toolbridge", about = "Toolbridge CLI - talk to an MCP tool server")]
struct Cli {
    /// Tool server URL
    #[arg(long, env = "TOOLBRIDGE_URL", default_value = "http://127.0.0.1:8000")]
    server_url: String,

    /// Wire protocol used to reach the server
    #[arg(long, env = "TOOLBRIDGE_CLIENT_TRANSPORT", value_enum, default_value_t = Transport::Sse)]
    transport: Transport,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    /// Event stream at /sse with POSTs to the announced endpoint
    Sse,
    /// Streamable HTTP: one POST to /mcp per request
    Http,
}

impl From<Transport> for TransportKind {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Sse => Self::Sse,
            Transport::Http => Self::Http,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with an LLM agent that can call the server's tools
    Chat {
        /// Print tool calls and their results as they happen
        #[arg(long, short)]
        verbose: bool,

        /// Run in mock mode (echo responses). Set `AGENT_MODE=mock` via env.
        #[arg(long)]
        mock: bool,

        /// LLM API URL (OpenAI-compatible)
        #[arg(long, env = "LLM_URL")]
        llm_url: Option<String>,

        /// LLM model name
        #[arg(long, env = "LLM_MODEL")]
        model: Option<String>,

        /// Bearer token for the LLM API
        #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Upper bound on tool calls plus answers per message (at least 1)
        #[arg(long, env = "TOOLBRIDGE_MAX_ITERATIONS")]
        max_iterations: Option<NonZeroUsize>,

        /// Replace the default system prompt
        #[arg(long, env = "TOOLBRIDGE_SYSTEM_PROMPT")]
        system_prompt: Option<String>,
    },

    /// List the server's tools
    ListTools,

    /// Call a tool directly and print its result
    Call {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },

    /// List the server's resource templates
    Resources,

    /// Read a resource by URI
    Read {
        /// Resource URI, e.g. greeting://Ada
        uri: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let transport = transport::connect(cli.transport.into(), &cli.server_url).await?;

    match cli.command {
        Commands::Chat {
            verbose,
            mock,
            llm_url,
            model,
            api_key,
            max_iterations,
            system_prompt,
        } => {
            let is_mock = mock
                || std::env::var("AGENT_MODE")
                    .map(|v| v.eq_ignore_ascii_case("mock"))
                    .unwrap_or(false);

            let options = chat_cmd::ChatOptions {
                verbose,
                mock: is_mock,
                llm_url,
                model,
                api_key,
                max_iterations,
                system_prompt,
            };
            chat_cmd::run(transport, options).await?;
        }
        Commands::ListTools => tools_cmd::list_tools(transport.as_ref()).await?,
        Commands::Call { tool, arguments } => {
            tools_cmd::call(transport.as_ref(), &tool, &arguments).await?;
        }
        Commands::Resources => tools_cmd::resources(transport.as_ref()).await?,
        Commands::Read { uri } => tools_cmd::read(transport.as_ref(), &uri).await?,
    }

    Ok(())
}
