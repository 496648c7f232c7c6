//! Workspace path containment
//!
//! Resolves user-supplied relative paths against a single workspace root and
//! rejects anything that would land outside it, whether via `..` traversal,
//! an absolute path, or a symlinked intermediate directory.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::{ToolError, ToolResult};

/// Path validator rooted at a canonicalized workspace directory
///
/// Resolution is read-only: no files or directories are ever created, and
/// results are not cached.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Create a guard rooted at `root`. The root must exist; it is
    /// canonicalized once and fixed for the lifetime of the guard.
    pub fn new(root: impl AsRef<Path>) -> ToolResult<Self> {
        let raw = root.as_ref();
        let root = raw.canonicalize().map_err(|e| {
            ToolError::ValidationFailure(format!("workspace root {}: {}", raw.display(), e))
        })?;
        Ok(Self { root })
    }

    /// The canonical workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a raw path to a canonical path inside the workspace root
    ///
    /// An empty or `"."` input resolves to the root itself. For targets that
    /// do not exist yet (e.g. a `write_file` destination), the deepest
    /// existing ancestor is canonicalized and the remaining segments are
    /// appended lexically, so a symlinked intermediate directory cannot
    /// smuggle the result outside the root.
    pub fn resolve(&self, raw: &str) -> ToolResult<PathBuf> {
        if raw.contains('\0') {
            return Err(ToolError::ValidationFailure(
                "path contains null byte".to_string(),
            ));
        }

        let joined = if raw.is_empty() || raw == "." {
            self.root.clone()
        } else {
            // An absolute `raw` replaces the root here and is then caught
            // by the prefix check below.
            self.root.join(raw)
        };

        // Walk up to the deepest existing ancestor, remembering the
        // segments we strip on the way.
        let mut existing = joined.clone();
        let mut remainder: Vec<OsString> = Vec::new();
        while !existing.exists() {
            // A path that fails exists() but has symlink metadata is a
            // dangling symlink; its target cannot be verified, so reject.
            if existing.symlink_metadata().is_ok() {
                return Err(self.violation(raw));
            }
            match existing.components().next_back() {
                Some(Component::Normal(name)) => remainder.push(name.to_os_string()),
                Some(Component::ParentDir) => remainder.push(OsString::from("..")),
                Some(Component::CurDir) => {}
                _ => return Err(self.violation(raw)),
            }
            if !existing.pop() {
                return Err(self.violation(raw));
            }
        }

        let mut resolved = existing
            .canonicalize()
            .map_err(|e| ToolError::internal(format!("canonicalize {}: {}", existing.display(), e)))?;

        for segment in remainder.iter().rev() {
            if segment == ".." {
                resolved.pop();
            } else {
                resolved.push(segment);
            }
        }

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(self.violation(raw))
        }
    }

    fn violation(&self, raw: &str) -> ToolError {
        ToolError::PathViolation(raw.to_string())
    }
}
