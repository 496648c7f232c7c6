//! Workspace MCP Server
//!
//! MCP server exposing a sandboxed workspace: file read/write/list confined
//! to a configured root, shell command execution with a hard timeout, and an
//! echo tool. Every call passes through the shared middleware for rate
//! limiting, structured logging, and Prometheus metrics.

pub mod handlers;
pub mod params;
pub mod server;
pub mod types;

pub use server::WorkspaceMcpServer;
pub use types::Config;
