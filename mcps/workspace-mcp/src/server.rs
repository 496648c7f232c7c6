//! MCP Server implementation for the sandboxed workspace
//!
//! This module defines the main MCP server that exposes the workspace tools.
//! Tool bodies live in the handlers module; every call goes through the
//! telemetry wrapper so rate limiting, logging, and metrics apply uniformly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use mcp_middleware::{
    json_success, serve_metrics, text_success, tool_error_to_mcp, CallToolResult, CommandSandbox,
    McpError, PathGuard, RateLimitPolicy, RateLimiter, Telemetry, ToolError, ToolMetrics,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use tokio_util::sync::CancellationToken;

use crate::handlers;
use crate::params::*;
use crate::types::{Config, FeatureFlags, HealthResponse, ServerInfoResponse};

const SERVER_NAME: &str = "workspace-mcp";

/// The Workspace MCP Server
#[derive(Clone, Debug)]
pub struct WorkspaceMcpServer {
    guard: PathGuard,
    sandbox: CommandSandbox,
    telemetry: Arc<Telemetry>,
    config: Config,
    started_at: Instant,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Tool Router - Each tool delegates to its handler through the telemetry wrap
// ============================================================================

#[tool_router]
impl WorkspaceMcpServer {
    /// Create a new server, loading config from standard locations
    ///
    /// Config is searched in order:
    /// 1. `MCP_CONFIG_PATH` env var
    /// 2. `./workspace-mcp.toml`
    /// 3. `$XDG_CONFIG_HOME/workspace-mcp/config.toml`
    /// 4. `~/.workspace-mcp.toml`
    /// 5. Default config if none found
    ///
    /// Environment overrides (`WORKSPACE_PATH`, `MCP_RATE_LIMIT`, ...) are
    /// applied on top of whatever was loaded.
    pub fn new() -> Result<Self, ToolError> {
        let mut config = Self::load_config();
        config.apply_env_overrides();
        Self::with_config(config)
    }

    /// Create a new server with explicit config
    pub fn with_config(config: Config) -> Result<Self, ToolError> {
        let guard = PathGuard::new(&config.workspace.root)?;
        let sandbox = CommandSandbox::new(&config.command.shell, config.command.max_output_bytes);

        let limiter = if config.rate_limit.enabled {
            let policy = RateLimitPolicy::parse(&config.rate_limit.policy)?;
            if policy.disabled() {
                None
            } else {
                Some(Arc::new(RateLimiter::new(policy)))
            }
        } else {
            None
        };

        let telemetry = Arc::new(Telemetry::new(limiter, Arc::new(ToolMetrics::new())));

        Ok(Self {
            guard,
            sandbox,
            telemetry,
            config,
            started_at: Instant::now(),
            tool_router: Self::tool_router(),
        })
    }

    /// Load config from standard file locations
    fn load_config() -> Config {
        // 1. Check MCP_CONFIG_PATH env var first
        if let Ok(env_path) = std::env::var("MCP_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                if let Ok(content) = std::fs::read_to_string(&path) {
                    match toml::from_str::<Config>(&content) {
                        Ok(config) => {
                            tracing::info!("Loaded config from MCP_CONFIG_PATH={}", path.display());
                            return config;
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Failed to parse config from MCP_CONFIG_PATH={}: {}",
                                path.display(),
                                e
                            );
                        }
                    }
                }
            } else {
                tracing::warn!("MCP_CONFIG_PATH={} does not exist", env_path);
            }
        }

        // 2-4. Check standard file locations
        let mut config_paths = vec![PathBuf::from("workspace-mcp.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            config_paths.push(config_dir.join("workspace-mcp").join("config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            config_paths.push(home.join(".workspace-mcp.toml"));
        }

        for path in config_paths {
            if path.exists() {
                if let Ok(content) = std::fs::read_to_string(&path) {
                    match toml::from_str::<Config>(&content) {
                        Ok(config) => {
                            tracing::info!("Loaded config from {}", path.display());
                            return config;
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse config {}: {}", path.display(), e);
                        }
                    }
                }
            }
        }

        // 5. Default config
        tracing::info!("Using default configuration");
        Config::default()
    }

    /// Start the Prometheus metrics endpoint, if enabled
    ///
    /// Returns a token the caller cancels on shutdown.
    pub fn spawn_metrics_endpoint(&self) -> Option<CancellationToken> {
        if !self.config.metrics.enabled {
            return None;
        }
        let addr = format!("127.0.0.1:{}", self.config.metrics.port);
        let metrics = Arc::clone(self.telemetry.metrics());
        let cancel = CancellationToken::new();
        tokio::spawn(serve_metrics(addr, metrics, cancel.clone()));
        Some(cancel)
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    #[tool(description = "Echo a message back (useful for connectivity checks)")]
    async fn echo(
        &self,
        Parameters(params): Parameters<EchoParams>,
    ) -> Result<CallToolResult, McpError> {
        let message = self
            .telemetry
            .wrap(
                "echo",
                &self.config.client_id,
                true,
                &["message"],
                handlers::echo(params),
            )
            .await
            .map_err(tool_error_to_mcp)?;
        Ok(text_success(message))
    }

    #[tool(description = "Read a UTF-8 file from the workspace")]
    async fn read_file(
        &self,
        Parameters(params): Parameters<ReadFileParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .telemetry
            .wrap(
                "read_file",
                &self.config.client_id,
                true,
                &["path"],
                handlers::read_file(&self.guard, &self.config, params),
            )
            .await
            .map_err(tool_error_to_mcp)?;
        json_success(&response)
    }

    #[tool(description = "Write a UTF-8 file inside the workspace, creating parent directories")]
    async fn write_file(
        &self,
        Parameters(params): Parameters<WriteFileParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .telemetry
            .wrap(
                "write_file",
                &self.config.client_id,
                true,
                &["path", "content"],
                handlers::write_file(&self.guard, &self.config, params),
            )
            .await
            .map_err(tool_error_to_mcp)?;
        json_success(&response)
    }

    #[tool(description = "List files in a workspace directory (sorted, capped)")]
    async fn list_files(
        &self,
        Parameters(params): Parameters<ListFilesParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .telemetry
            .wrap(
                "list_files",
                &self.config.client_id,
                true,
                &["directory"],
                handlers::list_files(&self.guard, &self.config, params),
            )
            .await
            .map_err(tool_error_to_mcp)?;
        json_success(&response)
    }

    #[tool(description = "Run a shell command inside the workspace with a hard timeout")]
    async fn run_command(
        &self,
        Parameters(params): Parameters<RunCommandParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .telemetry
            .wrap(
                "run_command",
                &self.config.client_id,
                true,
                &["command", "cwd", "timeout_secs"],
                handlers::run_command(&self.guard, &self.sandbox, &self.config, params),
            )
            .await
            .map_err(tool_error_to_mcp)?;
        json_success(&response)
    }

    #[tool(description = "Server health and feature status (never rate limited)")]
    async fn health_check(&self) -> Result<CallToolResult, McpError> {
        let response = self
            .telemetry
            .wrap("health_check", &self.config.client_id, false, &[], async {
                Ok(HealthResponse {
                    status: "healthy".to_string(),
                    server: SERVER_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    workspace: self.config.workspace.root.clone(),
                    uptime_seconds: self.started_at.elapsed().as_secs(),
                    timestamp: chrono::Utc::now(),
                    features: FeatureFlags {
                        rate_limiting: self.config.rate_limit.enabled,
                        metrics: self.config.metrics.enabled,
                    },
                })
            })
            .await
            .map_err(tool_error_to_mcp)?;
        json_success(&response)
    }

    #[tool(description = "Effective configuration and request counters (never rate limited)")]
    async fn server_info(&self) -> Result<CallToolResult, McpError> {
        let response = self
            .telemetry
            .wrap("server_info", &self.config.client_id, false, &[], async {
                Ok(ServerInfoResponse {
                    server: SERVER_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    config: self.config.clone(),
                    request_counts: self.telemetry.metrics().snapshot(),
                })
            })
            .await
            .map_err(tool_error_to_mcp)?;
        json_success(&response)
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for WorkspaceMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Sandboxed workspace MCP server. File tools are confined to the \
                 workspace root, shell commands run with a hard timeout, and all \
                 tools except health_check and server_info are rate limited."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.workspace.root = dir.path().display().to_string();
        config.metrics.enabled = false;
        config
    }

    #[test]
    fn test_with_config_builds_all_components() {
        let dir = TempDir::new().unwrap();
        let server = WorkspaceMcpServer::with_config(test_config(&dir)).unwrap();
        assert!(server.config.rate_limit.enabled);
    }

    #[test]
    fn test_missing_workspace_root_rejected() {
        let mut config = Config::default();
        config.workspace.root = "/definitely/not/a/real/dir".to_string();
        let err = WorkspaceMcpServer::with_config(config).unwrap_err();
        assert!(matches!(err, ToolError::ValidationFailure(_)));
    }

    #[test]
    fn test_malformed_rate_limit_policy_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.rate_limit.policy = "fast".to_string();
        let err = WorkspaceMcpServer::with_config(config).unwrap_err();
        assert!(matches!(err, ToolError::ValidationFailure(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_budget_is_per_tool() {
        // A 3/minute budget is tracked per (client, tool): the fourth call
        // on one tool is rejected while another tool's bucket stays fresh.
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), "data").unwrap();
        let mut config = test_config(&dir);
        config.rate_limit.policy = "3/minute".to_string();
        let server = WorkspaceMcpServer::with_config(config).unwrap();

        for _ in 0..3 {
            let result = server
                .telemetry
                .wrap(
                    "read_file",
                    "default",
                    true,
                    &["path"],
                    handlers::read_file(
                        &server.guard,
                        &server.config,
                        ReadFileParams {
                            path: "f.txt".to_string(),
                        },
                    ),
                )
                .await;
            assert!(result.is_ok());
        }

        let rejected = server
            .telemetry
            .wrap(
                "read_file",
                "default",
                true,
                &["path"],
                handlers::read_file(
                    &server.guard,
                    &server.config,
                    ReadFileParams {
                        path: "f.txt".to_string(),
                    },
                ),
            )
            .await;
        assert!(matches!(rejected, Err(ToolError::RateLimitExceeded { .. })));

        // Separate tool, separate bucket
        let other = server
            .telemetry
            .wrap(
                "list_files",
                "default",
                true,
                &["directory"],
                handlers::list_files(
                    &server.guard,
                    &server.config,
                    ListFilesParams { directory: None },
                ),
            )
            .await;
        assert!(other.is_ok());

        let metrics = server.telemetry.metrics();
        assert_eq!(metrics.request_count("read_file", "success"), 3);
        assert_eq!(metrics.request_count("read_file", "rate_limited"), 1);
        assert_eq!(metrics.request_count("list_files", "success"), 1);

        let exposition = metrics.to_prometheus();
        assert!(exposition
            .contains("mcp_requests_total{tool=\"read_file\",status=\"rate_limited\"} 1"));
    }

    #[tokio::test]
    async fn test_error_kinds_reach_counters_end_to_end() {
        let dir = TempDir::new().unwrap();
        let server = WorkspaceMcpServer::with_config(test_config(&dir)).unwrap();

        let result = server
            .telemetry
            .wrap(
                "read_file",
                "default",
                true,
                &["path"],
                handlers::read_file(
                    &server.guard,
                    &server.config,
                    ReadFileParams {
                        path: "../escape".to_string(),
                    },
                ),
            )
            .await;
        assert!(matches!(result, Err(ToolError::PathViolation(_))));
        assert_eq!(
            server
                .telemetry
                .metrics()
                .request_count("read_file", "path_violation"),
            1
        );
    }
}
