//! MCP Middleware - the layer every tool call passes through
//!
//! This crate provides the guards and instrumentation shared by MCP servers
//! that expose filesystem and shell tools:
//!
//! - **PathGuard**: resolves user paths against a workspace root and rejects
//!   escapes via `..`, absolute paths, or symlinks
//! - **RateLimiter**: fixed-window per-`(client, tool)` request budgets
//! - **CommandSandbox**: shell execution with a working-directory constraint,
//!   hard timeout, and bounded output capture
//! - **Telemetry**: per-request ids, structured start/terminal log events,
//!   request counters and duration histograms
//! - **ToolError**: the closed error taxonomy all of the above raise
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_middleware::{PathGuard, RateLimiter, RateLimitPolicy, Telemetry, ToolMetrics};
//! use std::sync::Arc;
//!
//! let guard = PathGuard::new("/workspace")?;
//! let limiter = Arc::new(RateLimiter::new(RateLimitPolicy::parse("100/minute")?));
//! let telemetry = Telemetry::new(Some(limiter), Arc::new(ToolMetrics::new()));
//!
//! let resolved = telemetry
//!     .wrap("read_file", "alice", true, &["path"], async { guard.resolve("notes.txt") })
//!     .await?;
//! ```

pub mod error;
pub mod init;
pub mod limiter;
pub mod metrics;
pub mod metrics_http;
pub mod pathguard;
pub mod result;
pub mod sandbox;
pub mod telemetry;

// Re-export commonly used items at crate root
pub use error::{tool_error_to_mcp, ToolError, ToolResult};
pub use init::init_tracing;
pub use limiter::{RateLimitPolicy, RateLimiter};
pub use metrics::ToolMetrics;
pub use metrics_http::serve_metrics;
pub use pathguard::PathGuard;
pub use result::{json_success, text_success};
pub use sandbox::{CommandInvocation, CommandResult, CommandSandbox};
pub use telemetry::{RequestContext, Telemetry};

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, Content},
    ErrorData as McpError,
};
