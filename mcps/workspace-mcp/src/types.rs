//! Type definitions for the workspace MCP server

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration Types
// ============================================================================

/// Server configuration
///
/// Loaded from a TOML file (see `WorkspaceMcpServer::load_config` for the
/// search order), then overridden by the environment variables the original
/// deployment knobs use (`WORKSPACE_PATH`, `MCP_RATE_LIMIT`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Opaque client identifier attached to every call from this transport.
    /// The server treats it as already authenticated.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub command: CommandConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_client_id() -> String {
    "default".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            workspace: WorkspaceConfig::default(),
            limits: LimitsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            command: CommandConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Apply environment variable overrides on top of file/default values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("WORKSPACE_PATH") {
            self.workspace.root = root;
        }
        if let Ok(policy) = std::env::var("MCP_RATE_LIMIT") {
            self.rate_limit.policy = policy;
        }
        if let Ok(enabled) = std::env::var("MCP_ENABLE_RATE_LIMITING") {
            self.rate_limit.enabled = enabled.eq_ignore_ascii_case("true");
        }
        if let Ok(size) = std::env::var("MCP_MAX_FILE_SIZE") {
            if let Ok(size) = size.parse() {
                self.limits.max_file_size = size;
            }
        }
        if let Ok(timeout) = std::env::var("MCP_COMMAND_TIMEOUT") {
            if let Ok(timeout) = timeout.parse() {
                self.command.default_timeout_secs = timeout;
            }
        }
        if let Ok(enabled) = std::env::var("MCP_ENABLE_METRICS") {
            self.metrics.enabled = enabled.eq_ignore_ascii_case("true");
        }
        if let Ok(port) = std::env::var("MCP_METRICS_PORT") {
            if let Ok(port) = port.parse() {
                self.metrics.port = port;
            }
        }
        if let Ok(client_id) = std::env::var("MCP_CLIENT_ID") {
            self.client_id = client_id;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory outside of which no file operation may act
    #[serde(default = "default_workspace_root")]
    pub root: String,
}

fn default_workspace_root() -> String {
    "/workspace".to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum file size in bytes for read/write operations
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    /// Maximum entries per list operation
    #[serde(default = "default_max_files_per_list")]
    pub max_files_per_list: usize,
}

fn default_max_file_size() -> usize {
    1024 * 1024 // 1MiB
}

fn default_max_files_per_list() -> usize {
    1000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_files_per_list: default_max_files_per_list(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Budget string, e.g. "100/minute"
    #[serde(default = "default_rate_limit")]
    pub policy: String,
}

fn default_true() -> bool {
    true
}

fn default_rate_limit() -> String {
    "100/minute".to_string()
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: default_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Shell used to execute commands
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Default timeout in seconds
    #[serde(default = "default_timeout")]
    pub default_timeout_secs: u64,
    /// Maximum timeout in seconds (hard cap on per-call overrides)
    #[serde(default = "default_max_timeout")]
    pub max_timeout_secs: u64,
    /// Maximum output size per stream (stdout/stderr) in bytes
    #[serde(default = "default_max_output")]
    pub max_output_bytes: usize,
}

fn default_shell() -> String {
    "/bin/bash".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_timeout() -> u64 {
    300
}

fn default_max_output() -> usize {
    1024 * 1024 // 1MB
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            default_timeout_secs: default_timeout(),
            max_timeout_secs: default_max_timeout(),
            max_output_bytes: default_max_output(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Port for the Prometheus /metrics endpoint (bound to localhost)
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Response for read_file
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadFileResponse {
    pub path: String,
    pub content: String,
    pub size: u64,
}

/// Response for write_file
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteFileResponse {
    pub path: String,
    pub success: bool,
    pub bytes_written: usize,
}

/// File or directory entry
#[derive(Debug, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String, // "file" or "directory"
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
}

/// Response for list_files
#[derive(Debug, Serialize, Deserialize)]
pub struct ListFilesResponse {
    pub directory: String,
    pub entries: Vec<FileEntry>,
    pub total_count: usize,
}

/// Response for run_command
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandOutput {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub truncated: bool,
}

/// Response for health_check
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub server: String,
    pub version: String,
    pub workspace: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
    pub features: FeatureFlags,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub rate_limiting: bool,
    pub metrics: bool,
}

/// Response for server_info
#[derive(Debug, Serialize)]
pub struct ServerInfoResponse {
    pub server: String,
    pub version: String,
    pub config: Config,
    pub request_counts: serde_json::Value,
}
