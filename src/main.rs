use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dirigent::config::DirigentConfig;
use dirigent::server;

#[derive(Parser)]
#[command(name = "dirigent", version, about = "Directive management MCP server for AI coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (transport chosen by config: stdio or http)
    Serve,
    /// Install or refresh the core directive set from the registry
    Sync,
    /// Compare installed directives against the registry
    CheckUpdates,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = DirigentConfig::load()?;

    // Initialize tracing with the configured log level.
    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => match config.server.transport.as_str() {
            "http" => server::serve_http(config).await?,
            _ => server::serve_stdio(config).await?,
        },
        Command::Sync => {
            let sync = server::setup_shared_state(&config)?.sync();
            let report = tokio::task::spawn_blocking(move || sync.update_all()).await??;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::CheckUpdates => {
            let sync = server::setup_shared_state(&config)?.sync();
            let check =
                tokio::task::spawn_blocking(move || sync.check_updates(None, None)).await??;
            println!("{}", serde_json::to_string_pretty(&check)?);
        }
    }

    Ok(())
}
