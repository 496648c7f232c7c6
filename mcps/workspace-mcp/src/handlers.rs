//! Tool handlers for the workspace MCP server
//!
//! Each handler performs one tool operation and returns `ToolResult`, so every
//! failure carries one of the closed set of error kinds. The telemetry wrapper
//! in `server.rs` takes care of logging, counting, and rate limiting.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mcp_middleware::{CommandInvocation, CommandSandbox, PathGuard, ToolError, ToolResult};
use tokio::fs;

use crate::params::*;
use crate::types::{
    CommandOutput, Config, FileEntry, ListFilesResponse, ReadFileResponse, WriteFileResponse,
};

// NotFound and InvalidData are classified as caller input errors: the
// argument named something that does not exist or is not text. The message
// prefix keeps them distinguishable from genuinely malformed arguments.
fn io_error(context: &str, path: &Path, err: std::io::Error) -> ToolError {
    match err.kind() {
        std::io::ErrorKind::NotFound => {
            ToolError::ValidationFailure(format!("{}: not found: {}", context, path.display()))
        }
        std::io::ErrorKind::InvalidData => ToolError::ValidationFailure(format!(
            "{}: not valid UTF-8: {}",
            context,
            path.display()
        )),
        _ => ToolError::internal(format!("{} {}: {}", context, path.display(), err)),
    }
}

pub async fn echo(params: EchoParams) -> ToolResult<String> {
    if params.message.is_empty() {
        return Err(ToolError::ValidationFailure(
            "message must not be empty".to_string(),
        ));
    }
    Ok(format!("Echo: {}", params.message))
}

pub async fn read_file(
    guard: &PathGuard,
    config: &Config,
    params: ReadFileParams,
) -> ToolResult<ReadFileResponse> {
    let resolved = guard.resolve(&params.path)?;

    let metadata = fs::metadata(&resolved)
        .await
        .map_err(|e| io_error("read", &resolved, e))?;

    if metadata.is_dir() {
        return Err(ToolError::ValidationFailure(format!(
            "read: is a directory: {}",
            resolved.display()
        )));
    }

    // Size check before reading so an oversized file is never pulled into memory
    if metadata.len() > config.limits.max_file_size as u64 {
        return Err(ToolError::SizeLimitExceeded {
            size: metadata.len(),
            max: config.limits.max_file_size as u64,
        });
    }

    let content = fs::read_to_string(&resolved)
        .await
        .map_err(|e| io_error("read", &resolved, e))?;

    Ok(ReadFileResponse {
        path: params.path,
        size: metadata.len(),
        content,
    })
}

pub async fn write_file(
    guard: &PathGuard,
    config: &Config,
    params: WriteFileParams,
) -> ToolResult<WriteFileResponse> {
    let resolved = guard.resolve(&params.path)?;

    if params.content.len() > config.limits.max_file_size {
        return Err(ToolError::SizeLimitExceeded {
            size: params.content.len() as u64,
            max: config.limits.max_file_size as u64,
        });
    }

    if resolved.is_dir() {
        return Err(ToolError::ValidationFailure(format!(
            "write: is a directory: {}",
            resolved.display()
        )));
    }

    if let Some(parent) = resolved.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error("write", parent, e))?;
    }

    fs::write(&resolved, &params.content)
        .await
        .map_err(|e| io_error("write", &resolved, e))?;

    Ok(WriteFileResponse {
        path: params.path,
        success: true,
        bytes_written: params.content.len(),
    })
}

pub async fn list_files(
    guard: &PathGuard,
    config: &Config,
    params: ListFilesParams,
) -> ToolResult<ListFilesResponse> {
    let directory = params.directory.unwrap_or_default();
    let resolved = guard.resolve(&directory)?;

    if !resolved.is_dir() {
        return Err(ToolError::ValidationFailure(format!(
            "list: not a directory: {}",
            resolved.display()
        )));
    }

    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(&resolved)
        .await
        .map_err(|e| io_error("list", &resolved, e))?;

    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| io_error("list", &resolved, e))?
    {
        // Entries that vanish mid-listing are skipped, not errors
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        let modified: Option<DateTime<Utc>> = metadata.modified().ok().map(|t| t.into());

        entries.push(FileEntry {
            name: entry.file_name().to_string_lossy().to_string(),
            entry_type: if metadata.is_dir() {
                "directory".to_string()
            } else {
                "file".to_string()
            },
            size: if metadata.is_file() {
                Some(metadata.len())
            } else {
                None
            },
            modified,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    let total_count = entries.len();
    entries.truncate(config.limits.max_files_per_list);

    Ok(ListFilesResponse {
        directory,
        entries,
        total_count,
    })
}

pub async fn run_command(
    guard: &PathGuard,
    sandbox: &CommandSandbox,
    config: &Config,
    params: RunCommandParams,
) -> ToolResult<CommandOutput> {
    if params.command.trim().is_empty() {
        return Err(ToolError::ValidationFailure(
            "command must not be empty".to_string(),
        ));
    }

    let timeout_secs = params
        .timeout_secs
        .unwrap_or(config.command.default_timeout_secs)
        .min(config.command.max_timeout_secs);

    let workdir = guard.resolve(params.cwd.as_deref().unwrap_or(""))?;
    if !workdir.is_dir() {
        return Err(ToolError::ValidationFailure(format!(
            "cwd: not a directory: {}",
            workdir.display()
        )));
    }

    let result = sandbox
        .run(&CommandInvocation {
            command: params.command.clone(),
            workdir,
            timeout: Duration::from_secs(timeout_secs),
        })
        .await?;

    if result.timed_out {
        return Err(ToolError::ExecutionTimeout(timeout_secs));
    }

    Ok(CommandOutput {
        command: params.command,
        exit_code: result.exit_code,
        stdout: result.stdout,
        stderr: result.stderr,
        duration_ms: result.duration_ms,
        truncated: result.truncated,
    })
}
