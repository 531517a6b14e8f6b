//! Store persisted as a single TOML document.
//!
//! The whole document is held in memory and rewritten after every mutation.
//! Writes go to a sibling temp file first and are renamed into place.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::memory::StoreData;
use super::{PreparedWorkspace, Project, ProjectId, ProjectStore, Stack, StackId};

/// File-backed store used by the CLI.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl FileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = load(&path).await?;
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts or replaces a project.
    pub async fn upsert_project(&self, project: Project) -> Result<()> {
        self.mutate(|data| {
            data.upsert_project(project);
            Ok(())
        })
        .await
    }

    /// Inserts or replaces a stack matched by title, assigning a fresh id to
    /// new titles. Returns the stored stack.
    pub async fn upsert_stack_by_title(&self, mut stack: Stack) -> Result<Stack> {
        self.mutate(|data| {
            stack.id = match data.stacks.iter().find(|s| s.title == stack.title) {
                Some(existing) => existing.id,
                None => data.stacks.iter().map(|s| s.id).max().unwrap_or(0) + 1,
            };
            data.upsert_stack(stack.clone());
            Ok(stack)
        })
        .await
    }

    /// Every project in the store.
    pub async fn list_projects(&self) -> Vec<Project> {
        self.data.lock().await.projects.clone()
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut StoreData) -> Result<T>) -> Result<T> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let out = f(&mut next)?;
        save(&self.path, &next).await?;
        *data = next;
        Ok(out)
    }
}

async fn load(path: &Path) -> Result<StoreData> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(StoreData::default());
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read store file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse store file: {}", path.display()))
}

async fn save(path: &Path, data: &StoreData) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(data).context("Failed to serialize store")?;

    let tmp = path.with_extension("toml.tmp");
    tokio::fs::write(&tmp, content)
        .await
        .with_context(|| format!("Failed to write store file: {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace store file: {}", path.display()))?;

    debug!(path = %path.display(), "store saved");
    Ok(())
}

#[async_trait]
impl ProjectStore for FileStore {
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(self.data.lock().await.project(id).cloned())
    }

    async fn get_stack(&self, id: StackId) -> Result<Option<Stack>> {
        Ok(self.data.lock().await.stack(id).cloned())
    }

    async fn list_stacks(&self) -> Result<Vec<Stack>> {
        Ok(self.data.lock().await.stacks.clone())
    }

    async fn set_project_workspace_id(&self, id: ProjectId, workspace_id: &str) -> Result<()> {
        self.mutate(|data| {
            data.project_mut(id)?.workspace_id = Some(workspace_id.to_string());
            Ok(())
        })
        .await
    }

    async fn clear_project_workspace_id(&self, id: ProjectId) -> Result<()> {
        self.mutate(|data| {
            data.project_mut(id)?.workspace_id = None;
            Ok(())
        })
        .await
    }

    async fn list_projects_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Project>> {
        Ok(self.data.lock().await.inactive_since(cutoff))
    }

    async fn insert_prepared_workspace(
        &self,
        stack_id: StackId,
        workspace_id: &str,
        pack_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<PreparedWorkspace> {
        self.mutate(|data| Ok(data.insert_prepared(stack_id, workspace_id, pack_hash, created_at)))
            .await
    }

    async fn count_unassigned_prepared_workspaces(&self, stack_id: StackId) -> Result<usize> {
        Ok(self.data.lock().await.prepared_for(stack_id).len())
    }

    async fn list_prepared_workspaces(&self, stack_id: StackId) -> Result<Vec<PreparedWorkspace>> {
        Ok(self.data.lock().await.prepared_for(stack_id))
    }

    async fn delete_prepared_workspace(&self, id: i64) -> Result<()> {
        self.mutate(|data| {
            data.prepared.retain(|p| p.id != id);
            Ok(())
        })
        .await
    }

    async fn claim_prepared_workspace(
        &self,
        stack_id: StackId,
        pack_hash: &str,
    ) -> Result<Option<PreparedWorkspace>> {
        self.mutate(|data| Ok(data.claim_prepared(stack_id, pack_hash)))
            .await
    }
}
