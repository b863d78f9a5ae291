//! Stdio MCP server for Delta Exchange.
//!
//! Reads `DELTA_API_KEY`, `DELTA_API_SECRET` and optionally `DELTA_BASE_URL`.
//! Logs go to stderr and honor `RUST_LOG` (default `info`).

use delta_mcp::Dispatcher;
use delta_mcp::exchange::Config;
use delta_mcp::server::Server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> delta_mcp::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        host = %config.host,
        api_key = %config.credentials.masked_key(),
        timeout_secs = config.timeout.as_secs(),
        "starting delta-exchange MCP server"
    );

    let server = Server::new(Dispatcher::from_config(config)?);
    server.serve_stdio().await?;

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
