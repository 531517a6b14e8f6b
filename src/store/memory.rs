//! In-process store backed by maps behind an async lock.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{PreparedWorkspace, Project, ProjectId, ProjectStore, Stack, StackId};

/// Store contents. Shared with `FileStore`, which persists the same shape.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct StoreData {
    #[serde(default)]
    pub(crate) next_prepared_id: i64,
    #[serde(default)]
    pub(crate) stacks: Vec<Stack>,
    #[serde(default)]
    pub(crate) projects: Vec<Project>,
    #[serde(default)]
    pub(crate) prepared: Vec<PreparedWorkspace>,
}

impl StoreData {
    pub(crate) fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub(crate) fn project_mut(&mut self, id: ProjectId) -> Result<&mut Project> {
        self.projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow::anyhow!("Project {id} does not exist"))
    }

    pub(crate) fn stack(&self, id: StackId) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.id == id)
    }

    pub(crate) fn upsert_project(&mut self, project: Project) {
        match self.projects.iter_mut().find(|p| p.id == project.id) {
            Some(existing) => *existing = project,
            None => self.projects.push(project),
        }
    }

    pub(crate) fn upsert_stack(&mut self, stack: Stack) {
        match self.stacks.iter_mut().find(|s| s.id == stack.id) {
            Some(existing) => *existing = stack,
            None => self.stacks.push(stack),
        }
    }

    pub(crate) fn inactive_since(&self, cutoff: DateTime<Utc>) -> Vec<Project> {
        self.projects
            .iter()
            .filter(|p| p.last_accessed < cutoff)
            .cloned()
            .collect()
    }

    pub(crate) fn insert_prepared(
        &mut self,
        stack_id: StackId,
        workspace_id: &str,
        pack_hash: &str,
        created_at: DateTime<Utc>,
    ) -> PreparedWorkspace {
        self.next_prepared_id += 1;
        let row = PreparedWorkspace {
            id: self.next_prepared_id,
            stack_id,
            workspace_id: workspace_id.to_string(),
            pack_hash: pack_hash.to_string(),
            created_at,
        };
        self.prepared.push(row.clone());
        row
    }

    pub(crate) fn prepared_for(&self, stack_id: StackId) -> Vec<PreparedWorkspace> {
        let mut rows: Vec<_> = self
            .prepared
            .iter()
            .filter(|p| p.stack_id == stack_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.created_at, p.id));
        rows
    }

    pub(crate) fn claim_prepared(
        &mut self,
        stack_id: StackId,
        pack_hash: &str,
    ) -> Option<PreparedWorkspace> {
        let id = self
            .prepared_for(stack_id)
            .into_iter()
            .find(|p| p.pack_hash == pack_hash)?
            .id;
        let index = self.prepared.iter().position(|p| p.id == id)?;
        Some(self.prepared.remove(index))
    }
}

/// Store that lives in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a stack.
    pub async fn upsert_stack(&self, stack: Stack) {
        self.data.write().await.upsert_stack(stack);
    }

    /// Inserts or replaces a project.
    pub async fn upsert_project(&self, project: Project) {
        self.data.write().await.upsert_project(project);
    }

    /// Every warm pool row, across stacks.
    pub async fn prepared_workspaces(&self) -> Vec<PreparedWorkspace> {
        self.data.read().await.prepared.clone()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(self.data.read().await.project(id).cloned())
    }

    async fn get_stack(&self, id: StackId) -> Result<Option<Stack>> {
        Ok(self.data.read().await.stack(id).cloned())
    }

    async fn list_stacks(&self) -> Result<Vec<Stack>> {
        Ok(self.data.read().await.stacks.clone())
    }

    async fn set_project_workspace_id(&self, id: ProjectId, workspace_id: &str) -> Result<()> {
        self.data.write().await.project_mut(id)?.workspace_id = Some(workspace_id.to_string());
        Ok(())
    }

    async fn clear_project_workspace_id(&self, id: ProjectId) -> Result<()> {
        self.data.write().await.project_mut(id)?.workspace_id = None;
        Ok(())
    }

    async fn list_projects_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Project>> {
        Ok(self.data.read().await.inactive_since(cutoff))
    }

    async fn insert_prepared_workspace(
        &self,
        stack_id: StackId,
        workspace_id: &str,
        pack_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<PreparedWorkspace> {
        Ok(self
            .data
            .write()
            .await
            .insert_prepared(stack_id, workspace_id, pack_hash, created_at))
    }

    async fn count_unassigned_prepared_workspaces(&self, stack_id: StackId) -> Result<usize> {
        Ok(self.data.read().await.prepared_for(stack_id).len())
    }

    async fn list_prepared_workspaces(&self, stack_id: StackId) -> Result<Vec<PreparedWorkspace>> {
        Ok(self.data.read().await.prepared_for(stack_id))
    }

    async fn delete_prepared_workspace(&self, id: i64) -> Result<()> {
        self.data.write().await.prepared.retain(|p| p.id != id);
        Ok(())
    }

    async fn claim_prepared_workspace(
        &self,
        stack_id: StackId,
        pack_hash: &str,
    ) -> Result<Option<PreparedWorkspace>> {
        Ok(self.data.write().await.claim_prepared(stack_id, pack_hash))
    }
}
