//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that wire up the
//! registry store, resolver, sync engine, and MCP tool handler into a running
//! server.

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;

use crate::config::{default_dirigent_dir, DirigentConfig};
use crate::directive::lockfile::default_lockfile_path;
use crate::registry::{RegistryStore, SqliteRegistry};
use crate::tools::{DirigentTools, ToolContext};

/// Shared setup: open the registry and build the tool context. Its default
/// engines use the current working directory's project tier; requests can
/// override the project root per call.
pub fn setup_shared_state(config: &DirigentConfig) -> Result<Arc<ToolContext>> {
    let registry: Option<Arc<dyn RegistryStore>> = match config.resolved_registry_db() {
        Some(db_path) => {
            let store = SqliteRegistry::open(&db_path)?;
            tracing::info!(db = %db_path.display(), "registry ready");
            Some(Arc::new(store))
        }
        None => {
            tracing::info!("registry disabled, local tiers only");
            None
        }
    };

    let project_dir = std::env::current_dir()
        .ok()
        .map(|cwd| config.project_directives_dir(&cwd));
    let user_dir = config.resolved_user_dir();
    std::fs::create_dir_all(&user_dir)?;

    Ok(Arc::new(ToolContext::new(
        registry,
        project_dir,
        user_dir,
        default_lockfile_path(&default_dirigent_dir()),
        config.storage.project_subdir.clone(),
        config.registry.max_content_bytes,
    )))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: DirigentConfig) -> Result<()> {
    tracing::info!("starting dirigent MCP server on stdio");

    let ctx = setup_shared_state(&config)?;

    let tools = DirigentTools::new(ctx);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running — waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_http(config: DirigentConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting dirigent MCP server on HTTP");

    let ctx = setup_shared_state(&config)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(DirigentTools::new(ctx.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
