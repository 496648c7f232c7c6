//! Workspace MCP Server binary
//!
//! Serves the MCP protocol over stdio; logs go to stderr and metrics are
//! exposed on a localhost HTTP port when enabled.

use anyhow::Context;
use rmcp::ServiceExt;
use workspace_mcp::WorkspaceMcpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mcp_middleware::init_tracing("workspace_mcp")?;

    tracing::info!("Starting Workspace MCP Server");

    let server = WorkspaceMcpServer::new().context("failed to initialize server")?;
    let metrics_cancel = server.spawn_metrics_endpoint();

    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP server")?;

    tracing::info!("Server running, waiting for requests");
    service.waiting().await?;

    if let Some(cancel) = metrics_cancel {
        cancel.cancel();
    }
    tracing::info!("Server shut down");

    Ok(())
}
