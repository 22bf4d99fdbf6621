use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use toolbridge_server::app_state::AppState;
use toolbridge_server::{demo, router, stdio};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    /// HTTP server with SSE and streamable HTTP endpoints
    Sse,
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
}

#[derive(Parser)]
#[command(name = "toolbridge-server", about = "Demo MCP tool server")]
struct Args {
    /// Transport to serve on
    #[arg(long, env = "TOOLBRIDGE_TRANSPORT", value_enum, default_value_t = Transport::Sse)]
    transport: Transport,

    /// Address to bind (sse transport)
    #[arg(long, env = "TOOLBRIDGE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (sse transport)
    #[arg(long, env = "TOOLBRIDGE_PORT", default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout belongs to the protocol in stdio mode, so logs always go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let server = Arc::new(demo::server()?);

    match args.transport {
        Transport::Stdio => {
            tracing::info!("Starting server on stdio");
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            stdio::serve(&server, stdin, tokio::io::stdout()).await?;
        }
        Transport::Sse => {
            let app = router::create_router(AppState::new(server));

            let addr = format!("{}:{}", args.host, args.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            tracing::info!("toolbridge server listening on {addr}");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error")?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
