//! Parameter types for Workspace MCP tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EchoParams {
    #[schemars(description = "Message to echo back")]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReadFileParams {
    #[schemars(description = "Path to the file, relative to the workspace root")]
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    #[schemars(description = "Path to the file, relative to the workspace root")]
    pub path: String,

    #[schemars(description = "Content to write to the file")]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListFilesParams {
    #[schemars(description = "Directory to list, relative to the workspace root (default: root)")]
    #[serde(default)]
    pub directory: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RunCommandParams {
    #[schemars(description = "Shell command to execute")]
    pub command: String,

    #[schemars(description = "Working directory, relative to the workspace root (default: root)")]
    #[serde(default)]
    pub cwd: Option<String>,

    #[schemars(description = "Timeout in seconds (clamped to the server maximum)")]
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}
