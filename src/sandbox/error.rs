//! Domain-specific error types for sandbox operations.
//!
//! Typed errors enable callers to match on specific failure modes
//! rather than parsing error message strings.

use std::path::{Path, PathBuf};

use crate::store::ProjectId;

/// Errors that can occur during sandbox operations.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The project or its stack does not exist in the store.
    #[error("{kind} not found: {id}")]
    ResourceNotFound { kind: &'static str, id: i64 },

    /// The project has no workspace yet and creation was not requested.
    #[error("No sandbox found for project {project_id}")]
    NotReady { project_id: ProjectId },

    /// A file read targeted a path that does not exist.
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A path resolves outside the workspace root.
    #[error("Path escapes the workspace: {path}")]
    InvalidPath { path: String },

    /// A command could not be spawned or awaited.
    #[error("Failed to execute `{command}`: {source}")]
    ExecutionFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A git command ran but exited non-zero.
    #[error("git {args} failed: {stderr}")]
    GitFailure { args: String, stderr: String },

    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The project/stack store failed. Passed through unchanged.
    #[error(transparent)]
    Store(anyhow::Error),
}

/// Result alias for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

impl SandboxError {
    /// Creates a `ResourceNotFound` error for a project.
    pub fn project_not_found(id: ProjectId) -> Self {
        Self::ResourceNotFound {
            kind: "Project",
            id,
        }
    }

    /// Creates a `ResourceNotFound` error for a stack.
    pub fn stack_not_found(id: i64) -> Self {
        Self::ResourceNotFound { kind: "Stack", id }
    }

    /// Creates a `NotReady` error.
    pub fn not_ready(project_id: ProjectId) -> Self {
        Self::NotReady { project_id }
    }

    /// Creates a `NotFound` error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates an `InvalidPath` error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    /// Creates an `ExecutionFailure` error.
    pub fn execution_failure(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::ExecutionFailure {
            command: command.into(),
            source,
        }
    }

    /// Creates a `GitFailure` error from the git arguments and its stderr.
    pub fn git_failure(args: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::GitFailure {
            args: args.into(),
            stderr: stderr.into(),
        }
    }

    /// Creates an `Io` error, mapping `NotFound` I/O errors to [`SandboxError::NotFound`].
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::not_found(path);
        }
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns true if the project or stack was missing.
    pub fn is_resource_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
    }

    /// Returns true if no workspace has been allocated yet.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }

    /// Returns true if a file was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if a command could not be spawned.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::ExecutionFailure { .. })
    }

    /// Returns true if a git command exited non-zero.
    pub fn is_git_failure(&self) -> bool {
        matches!(self, Self::GitFailure { .. })
    }

    /// Returns true if the store failed.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
