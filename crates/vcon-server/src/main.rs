//! vcon-mcp binary: MCP server over stdio.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use vcon_infrastructure::bootstrap::{bootstrap, spawn_embedding_worker};
use vcon_infrastructure::config::AppConfig;
use vcon_infrastructure::logging;
use vcon_server::VconMcpServer;

#[derive(Parser)]
#[command(name = "vcon-mcp", version, about = "IETF vCon conversation store over MCP")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve MCP over stdio (the default).
    Serve,
    /// Load and validate the configuration, then exit.
    ConfigCheck,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("vcon=info,warn");
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::ConfigCheck => {
            let config = AppConfig::load()?;
            info!(
                cache = ?config.cache.provider,
                embedding = ?config.embedding.provider,
                rls = config.tenant.rls_enabled,
                plugins = ?config.plugins.modules,
                "configuration is valid"
            );
            Ok(())
        }
        Command::Serve => serve().await,
    }
}

async fn serve() -> Result<()> {
    let config = AppConfig::load()?;
    let context = Arc::new(bootstrap(config).await?);
    let worker_token = spawn_embedding_worker(&context);
    let plugins = Arc::clone(&context.plugins);

    let server = VconMcpServer::new(context);
    info!("serving MCP over stdio");
    let transport = rmcp::transport::io::stdio();
    let service = rmcp::serve_server(server, transport).await?;
    service.waiting().await?;

    if let Some(token) = worker_token {
        token.cancel();
    }
    plugins.shutdown_all().await;
    info!("shutdown complete");
    Ok(())
}
