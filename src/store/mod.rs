//! Project/stack store consumed by the sandbox layer.
//!
//! The store owns the durable foreign keys (`workspace_id`, `stack_id`) and
//! the warm pool rows. Two implementations ship with the crate:
//! - `MemoryStore`: in-process maps, for tests and embedding callers
//! - `FileStore`: a TOML document on disk, used by the CLI

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project identifier, assigned by the external backend.
pub type ProjectId = i64;

/// Stack identifier.
pub type StackId = i64;

/// A project as seen by the sandbox layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Stable identifier.
    pub id: ProjectId,
    /// Workspace allocated to this project, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    /// Stack the project was created from.
    pub stack_id: StackId,
    /// Last time a user touched the project.
    pub last_accessed: DateTime<Utc>,
    /// Exempt from inactivity reclamation.
    #[serde(default)]
    pub never_cleanup: bool,
}

impl Project {
    /// A project on `stack_id` with no workspace, accessed now.
    pub fn new(id: ProjectId, stack_id: StackId) -> Self {
        Self {
            id,
            workspace_id: None,
            stack_id,
            last_accessed: Utc::now(),
            never_cleanup: false,
        }
    }
}

/// An environment template projects are instantiated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    /// Identifier.
    pub id: StackId,
    /// Human title, unique across stacks.
    pub title: String,
    /// Short description shown to users.
    #[serde(default)]
    pub description: String,
    /// Source registry the stack's environment is built from.
    #[serde(default)]
    pub from_registry: String,
    /// One-shot setup script run when a workspace is prepared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_command: Option<String>,
    /// Long-running dev-server script.
    #[serde(default)]
    pub start_command: String,
    /// System prompt handed to the assistant for this stack.
    #[serde(default)]
    pub prompt: String,
    /// Fingerprint of `init_command` and `from_registry`.
    #[serde(default)]
    pub pack_hash: String,
    /// Expected setup time, a hint only.
    #[serde(default)]
    pub setup_time_seconds: u32,
}

/// A pre-initialized workspace waiting in the warm pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedWorkspace {
    /// Row identifier.
    pub id: i64,
    /// Stack the workspace was prepared for.
    pub stack_id: StackId,
    /// Identity of the prepared workspace on disk.
    pub workspace_id: String,
    /// Stack pack hash at preparation time.
    #[serde(default)]
    pub pack_hash: String,
    /// When the workspace was prepared.
    pub created_at: DateTime<Utc>,
}

/// Narrow interface to the external project/stack store.
///
/// Every method may fail; the sandbox layer propagates failures unchanged.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Loads a project.
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>>;

    /// Loads a stack.
    async fn get_stack(&self, id: StackId) -> Result<Option<Stack>>;

    /// All known stacks.
    async fn list_stacks(&self) -> Result<Vec<Stack>>;

    /// Records the workspace allocated to a project. Visible to every
    /// subsequent `get_project` once this returns.
    async fn set_project_workspace_id(&self, id: ProjectId, workspace_id: &str) -> Result<()>;

    /// Forgets a project's workspace after its storage was destroyed.
    async fn clear_project_workspace_id(&self, id: ProjectId) -> Result<()>;

    /// Snapshot of projects whose `last_accessed` is strictly before `cutoff`.
    async fn list_projects_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Project>>;

    /// Adds a warm pool row. Returns the stored row.
    async fn insert_prepared_workspace(
        &self,
        stack_id: StackId,
        workspace_id: &str,
        pack_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<PreparedWorkspace>;

    /// Number of unassigned warm pool rows for a stack.
    async fn count_unassigned_prepared_workspaces(&self, stack_id: StackId) -> Result<usize>;

    /// Unassigned warm pool rows for a stack, oldest first.
    async fn list_prepared_workspaces(&self, stack_id: StackId) -> Result<Vec<PreparedWorkspace>>;

    /// Removes a warm pool row. Removing an absent row is not an error.
    async fn delete_prepared_workspace(&self, id: i64) -> Result<()>;

    /// Removes and returns the oldest row for `stack_id` whose pack hash
    /// equals `pack_hash`. Each row is handed out at most once.
    async fn claim_prepared_workspace(
        &self,
        stack_id: StackId,
        pack_hash: &str,
    ) -> Result<Option<PreparedWorkspace>>;
}
