//! Error taxonomy for tool invocations
//!
//! Every failure raised by the middleware or a tool body is one of the
//! [`ToolError`] kinds below. Kinds are never converted into one another;
//! the telemetry layer uses [`ToolError::kind`] to label failure counters
//! and the protocol boundary uses [`tool_error_to_mcp`] to build the
//! client-facing response.

use rmcp::ErrorData as McpError;
use thiserror::Error;

/// Type alias for middleware and tool body results
pub type ToolResult<T> = Result<T, ToolError>;

/// The closed set of failures a tool invocation can surface
#[derive(Error, Debug)]
pub enum ToolError {
    /// Resolved path escapes the workspace root
    #[error("Path {0} is outside the workspace root")]
    PathViolation(String),

    /// Client exceeded the configured request budget
    #[error("Rate limit exceeded for {tool} (client {client})")]
    RateLimitExceeded { client: String, tool: String },

    /// File or content exceeds the configured byte limit
    #[error("Size limit exceeded: {size} bytes (max {max})")]
    SizeLimitExceeded { size: u64, max: u64 },

    /// Process could not be started (binary missing, spawn failure)
    #[error("Failed to execute command: {0}")]
    ExecutionFailure(String),

    /// Process exceeded its timeout and was killed
    #[error("Command timed out after {0}s")]
    ExecutionTimeout(u64),

    /// Malformed or empty input argument
    #[error("Invalid argument: {0}")]
    ValidationFailure(String),

    /// Unanticipated failure; the message wraps the underlying cause and is
    /// logged in full but never sent to clients verbatim
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Stable label for the `status` dimension of request counters
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::PathViolation(_) => "path_violation",
            ToolError::RateLimitExceeded { .. } => "rate_limited",
            ToolError::SizeLimitExceeded { .. } => "size_limit_exceeded",
            ToolError::ExecutionFailure(_) => "execution_failure",
            ToolError::ExecutionTimeout(_) => "execution_timeout",
            ToolError::ValidationFailure(_) => "validation_failure",
            ToolError::Internal(_) => "internal_error",
        }
    }

    /// Wrap an underlying cause as an internal error
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        ToolError::Internal(cause.to_string())
    }
}

/// Map a [`ToolError`] to the client-facing MCP error
///
/// Expected, caller-recoverable conditions keep their message; `Internal`
/// is logged with full detail here and replaced with a generic message so
/// stack traces and filesystem layout never leak into responses.
pub fn tool_error_to_mcp(err: ToolError) -> McpError {
    match &err {
        ToolError::PathViolation(_) | ToolError::ValidationFailure(_) => {
            McpError::invalid_params(err.to_string(), None)
        }
        ToolError::RateLimitExceeded { .. } | ToolError::SizeLimitExceeded { .. } => {
            McpError::invalid_request(err.to_string(), None)
        }
        ToolError::ExecutionFailure(_) | ToolError::ExecutionTimeout(_) => {
            McpError::internal_error(err.to_string(), None)
        }
        ToolError::Internal(detail) => {
            tracing::error!(detail = %detail, "internal tool error");
            McpError::internal_error("Internal server error", None)
        }
    }
}
