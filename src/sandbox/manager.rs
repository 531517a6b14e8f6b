//! Workspace allocation and lifecycle.
//!
//! A project's workspace moves through `UNALLOCATED -> ALLOCATING -> READY`
//! under the project's lock, and `READY -> TERMINATED` when its storage is
//! destroyed. A terminated identity is never handed out again; the next
//! allocation creates a new one.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{SandboxError, SandboxResult};
use super::git;
use super::paths;
use super::workspace::Workspace;
use crate::config::Config;
use crate::locks::LockRegistry;
use crate::store::{Project, ProjectId, ProjectStore, Stack};

/// Owns the lock registry and resolves projects to workspaces.
pub struct SandboxManager {
    store: Arc<dyn ProjectStore>,
    locks: LockRegistry<ProjectId>,
    config: Arc<Config>,
}

impl std::fmt::Debug for SandboxManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxManager")
            .field("root", &self.config.workspace.root)
            .field("locks", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl SandboxManager {
    /// Creates a manager over `store`.
    pub fn new(store: Arc<dyn ProjectStore>, config: Config) -> Self {
        Self {
            store,
            locks: LockRegistry::new(),
            config: Arc::new(config),
        }
    }

    /// The store this manager reads and updates.
    pub fn store(&self) -> &Arc<dyn ProjectStore> {
        &self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Per-project allocation locks.
    pub fn locks(&self) -> &LockRegistry<ProjectId> {
        &self.locks
    }

    /// Returns the project's workspace, allocating one if needed and allowed.
    ///
    /// Concurrent callers for the same project serialize on its lock: the
    /// first creates the workspace, the rest observe its id.
    ///
    /// # Errors
    ///
    /// - [`SandboxError::ResourceNotFound`] if the project or its stack is absent
    /// - [`SandboxError::NotReady`] if no workspace exists and `create_if_missing` is false
    /// - [`SandboxError::Store`] if the store fails
    pub async fn get_or_create(
        &self,
        project_id: ProjectId,
        create_if_missing: bool,
    ) -> SandboxResult<Workspace> {
        let _guard = self.locks.lock(&project_id).await;

        let project = self
            .store
            .get_project(project_id)
            .await
            .map_err(SandboxError::Store)?
            .ok_or_else(|| SandboxError::project_not_found(project_id))?;
        let stack = self
            .store
            .get_stack(project.stack_id)
            .await
            .map_err(SandboxError::Store)?
            .ok_or_else(|| SandboxError::stack_not_found(project.stack_id))?;

        if let Some(workspace_id) = &project.workspace_id {
            let workspace = self.handle(Some(project_id), workspace_id)?;
            if !workspace.root().join(".git").exists() {
                warn!(
                    project_id,
                    workspace_id = %workspace_id,
                    "workspace missing on disk, re-materializing"
                );
                self.materialize(&workspace).await?;
            }
            return Ok(workspace);
        }

        if !create_if_missing {
            return Err(SandboxError::not_ready(project_id));
        }

        let (workspace, from_pool) = match self.claim_prepared(project_id, &stack).await? {
            Some(workspace) => (workspace, true),
            None => {
                let workspace = self.handle(Some(project_id), &new_workspace_id())?;
                self.materialize(&workspace).await?;
                (workspace, false)
            }
        };

        if let Err(e) = self
            .store
            .set_project_workspace_id(project_id, workspace.id())
            .await
        {
            if let Err(cleanup) = remove_tree(workspace.root()).await {
                warn!(workspace_id = %workspace.id(), error = %cleanup, "failed to remove unrecorded workspace");
            }
            return Err(SandboxError::Store(e));
        }

        info!(
            project_id,
            stack_id = stack.id,
            workspace_id = %workspace.id(),
            from_pool,
            "workspace allocated"
        );
        Ok(workspace)
    }

    /// Creates an unassigned workspace for `stack` and runs the stack's init
    /// command in it to completion. Used to fill the warm pool.
    ///
    /// The init command's exit status is logged, not checked. If anything
    /// fails the new directory is removed before returning the error.
    pub async fn prepare(&self, stack: &Stack) -> SandboxResult<(Workspace, String)> {
        let workspace_id = new_workspace_id();
        let workspace = self.handle(None, &workspace_id)?;

        let result = async {
            self.materialize(&workspace).await?;
            if let Some(init) = stack.init_command.as_deref().filter(|c| !c.trim().is_empty()) {
                let output = workspace.run_command_output(init, None).await?;
                if !output.success() {
                    warn!(
                        stack_id = stack.id,
                        workspace_id = %workspace_id,
                        exit_code = ?output.exit_code,
                        "stack init command exited non-zero"
                    );
                }
            }
            Ok::<_, SandboxError>(())
        }
        .await;

        if let Err(e) = result {
            if let Err(cleanup) = remove_tree(workspace.root()).await {
                warn!(workspace_id = %workspace_id, error = %cleanup, "failed to remove failed workspace");
            }
            return Err(e);
        }

        debug!(stack_id = stack.id, workspace_id = %workspace_id, "workspace prepared");
        Ok((workspace, workspace_id))
    }

    /// Deletes the project's workspace storage and forgets its id.
    ///
    /// Idempotent: a project without a workspace, or whose directory is
    /// already gone, is not an error. Returns whether a directory was removed.
    pub async fn terminate_resources(&self, project: &Project) -> SandboxResult<bool> {
        let Some(workspace_id) = project.workspace_id.as_deref() else {
            return Ok(false);
        };

        let _guard = self.locks.lock(&project.id).await;

        let root = self.workspace_root(workspace_id)?;
        let removed = remove_tree(&root).await?;

        // Only forget the id if it still points at what was just removed.
        let current = self
            .store
            .get_project(project.id)
            .await
            .map_err(SandboxError::Store)?;
        if current.is_some_and(|p| p.workspace_id.as_deref() == Some(workspace_id)) {
            self.store
                .clear_project_workspace_id(project.id)
                .await
                .map_err(SandboxError::Store)?;
        }

        info!(project_id = project.id, workspace_id, removed, "workspace terminated");
        Ok(removed)
    }

    /// Deletes everything the sandbox layer holds for a project.
    pub async fn destroy_resources(&self, project: &Project) -> SandboxResult<bool> {
        self.terminate_resources(project).await
    }

    /// Reads a file from the project's workspace without taking the
    /// allocation lock. `None` when there is no workspace or no such file.
    pub async fn read_project_file(
        &self,
        project: &Project,
        path: &str,
    ) -> SandboxResult<Option<Vec<u8>>> {
        let Some(workspace_id) = project.workspace_id.as_deref() else {
            return Ok(None);
        };
        let root = self.workspace_root(workspace_id)?;
        let full = paths::resolve(&root, &self.config.workspace.path_prefix, path)?;

        match tokio::fs::read(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SandboxError::io(&full, e)),
        }
    }

    /// Removes a workspace directory that no project references, such as a
    /// stale pool entry. Returns whether anything was removed.
    pub async fn discard_workspace(&self, workspace_id: &str) -> SandboxResult<bool> {
        let root = self.workspace_root(workspace_id)?;
        remove_tree(&root).await
    }

    /// Builds a handle for an existing workspace id.
    pub fn workspace(&self, workspace_id: &str) -> SandboxResult<Workspace> {
        self.handle(None, workspace_id)
    }

    fn handle(&self, project_id: Option<ProjectId>, workspace_id: &str) -> SandboxResult<Workspace> {
        let root = self.workspace_root(workspace_id)?;
        Ok(Workspace::new(
            workspace_id.to_string(),
            project_id,
            root,
            Arc::clone(&self.config),
        ))
    }

    /// Directory for `workspace_id`. The id must be a single path component.
    fn workspace_root(&self, workspace_id: &str) -> SandboxResult<PathBuf> {
        let mut components = Path::new(workspace_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {
                Ok(self.config.workspace.workspace_path(workspace_id))
            }
            _ => Err(SandboxError::invalid_path(workspace_id)),
        }
    }

    /// Creates the directory and git repository. Safe to re-run.
    async fn materialize(&self, workspace: &Workspace) -> SandboxResult<()> {
        let root = workspace.root();
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| SandboxError::io(root, e))?;
        git::init_repo(
            root,
            &self.config.git,
            &self.config.workspace.changelog_file,
        )
        .await
    }

    /// Takes the oldest prepared workspace matching the stack's pack hash
    /// whose directory still exists. Rows whose directory vanished are
    /// consumed and skipped.
    async fn claim_prepared(
        &self,
        project_id: ProjectId,
        stack: &Stack,
    ) -> SandboxResult<Option<Workspace>> {
        loop {
            let Some(row) = self
                .store
                .claim_prepared_workspace(stack.id, &stack.pack_hash)
                .await
                .map_err(SandboxError::Store)?
            else {
                return Ok(None);
            };

            let workspace = match self.handle(Some(project_id), &row.workspace_id) {
                Ok(workspace) => workspace,
                Err(e) => {
                    warn!(prepared_id = row.id, error = %e, "skipping invalid prepared workspace");
                    continue;
                }
            };
            if workspace.root().join(".git").is_dir() {
                return Ok(Some(workspace));
            }
            warn!(
                prepared_id = row.id,
                workspace_id = %row.workspace_id,
                "prepared workspace missing on disk, skipping"
            );
            if let Err(e) = remove_tree(workspace.root()).await {
                warn!(workspace_id = %row.workspace_id, error = %e, "failed to remove partial workspace");
            }
        }
    }
}

fn new_workspace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Removes a directory tree. Returns false if it did not exist.
async fn remove_tree(root: &Path) -> SandboxResult<bool> {
    match tokio::fs::remove_dir_all(root).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SandboxError::io(root, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::git::git_available;
    use crate::store::MemoryStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use tempfile::{tempdir, TempDir};

    use crate::store::{PreparedWorkspace, StackId};

    fn stack(id: StackId, init_command: Option<&str>) -> Stack {
        Stack {
            id,
            title: format!("stack-{id}"),
            description: String::new(),
            from_registry: "registry/image:latest".to_string(),
            init_command: init_command.map(str::to_string),
            start_command: "true".to_string(),
            prompt: String::new(),
            pack_hash: "hash-1".to_string(),
            setup_time_seconds: 1,
        }
    }

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.workspace.root = dir.path().join("sandboxes");
        config
    }

    async fn setup(dir: &TempDir) -> (Arc<MemoryStore>, Arc<SandboxManager>) {
        let store = Arc::new(MemoryStore::new());
        store.upsert_stack(stack(1, None)).await;
        store.upsert_project(Project::new(10, 1)).await;
        let manager = Arc::new(SandboxManager::new(store.clone(), config(dir)));
        (store, manager)
    }

    fn workspace_dirs(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("sandboxes"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        if !git_available() {
            return; // Git not available
        }
        let dir = tempdir().unwrap();
        let (store, manager) = setup(&dir).await;

        let first = manager.get_or_create(10, true).await.unwrap();
        let second = manager.get_or_create(10, true).await.unwrap();
        let third = manager.get_or_create(10, false).await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(first.id(), third.id());
        assert!(first.root().join(".git").is_dir());
        assert_eq!(workspace_dirs(&dir), 1);

        let project = store.get_project(10).await.unwrap().unwrap();
        assert_eq!(project.workspace_id.as_deref(), Some(first.id()));
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_allocates_once() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let (_store, manager) = setup(&dir).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.get_or_create(10, true).await.unwrap().id().to_string()
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(workspace_dirs(&dir), 1);
        assert_eq!(manager.locks().prune(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_without_create_is_not_ready() {
        let dir = tempdir().unwrap();
        let (_store, manager) = setup(&dir).await;

        let err = manager.get_or_create(10, false).await.unwrap_err();
        assert!(err.is_not_ready());
        assert_eq!(workspace_dirs(&dir), 0);
    }

    #[tokio::test]
    async fn test_get_or_create_missing_project_or_stack() {
        let dir = tempdir().unwrap();
        let (store, manager) = setup(&dir).await;

        let err = manager.get_or_create(99, true).await.unwrap_err();
        assert!(err.is_resource_not_found());

        store.upsert_project(Project::new(11, 42)).await;
        let err = manager.get_or_create(11, true).await.unwrap_err();
        assert!(err.is_resource_not_found());
        assert_eq!(err.to_string(), "Stack not found: 42");

        // The lock is released on the error path.
        assert!(manager.locks().lock_for(&11).try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_get_or_create_consumes_prepared_workspace() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let (store, manager) = setup(&dir).await;

        let stack = store.get_stack(1).await.unwrap().unwrap();
        let (_, prepared_id) = manager.prepare(&stack).await.unwrap();
        store
            .insert_prepared_workspace(1, &prepared_id, &stack.pack_hash, Utc::now())
            .await
            .unwrap();

        let workspace = manager.get_or_create(10, true).await.unwrap();
        assert_eq!(workspace.id(), prepared_id);
        assert_eq!(workspace.project_id(), Some(10));
        assert_eq!(store.count_unassigned_prepared_workspaces(1).await.unwrap(), 0);

        store.upsert_project(Project::new(12, 1)).await;
        let other = manager.get_or_create(12, true).await.unwrap();
        assert_ne!(other.id(), prepared_id);
    }

    #[tokio::test]
    async fn test_get_or_create_skips_stale_prepared_workspace() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let (store, manager) = setup(&dir).await;

        let stack = store.get_stack(1).await.unwrap().unwrap();
        let (_, prepared_id) = manager.prepare(&stack).await.unwrap();
        store
            .insert_prepared_workspace(1, &prepared_id, "old-hash", Utc::now())
            .await
            .unwrap();

        let workspace = manager.get_or_create(10, true).await.unwrap();
        assert_ne!(workspace.id(), prepared_id);
        assert_eq!(store.count_unassigned_prepared_workspaces(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_removes_partial_prepared_workspace() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let (store, manager) = setup(&dir).await;

        let partial = dir.path().join("sandboxes").join("half-built");
        std::fs::create_dir_all(partial.join("app")).unwrap();
        std::fs::write(partial.join("app").join("index.ts"), "x").unwrap();
        store
            .insert_prepared_workspace(1, "half-built", "hash-1", Utc::now())
            .await
            .unwrap();

        let workspace = manager.get_or_create(10, true).await.unwrap();
        assert_ne!(workspace.id(), "half-built");
        assert!(!partial.exists());
        assert_eq!(store.count_unassigned_prepared_workspaces(1).await.unwrap(), 0);
        assert_eq!(workspace_dirs(&dir), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_rematerializes_missing_directory() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let (store, manager) = setup(&dir).await;
        store.set_project_workspace_id(10, "dangling-id").await.unwrap();

        let workspace = manager.get_or_create(10, false).await.unwrap();
        assert_eq!(workspace.id(), "dangling-id");
        assert!(workspace.root().join(".git").is_dir());
    }

    #[tokio::test]
    async fn test_terminate_resources_is_idempotent_and_forgets_id() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let (store, manager) = setup(&dir).await;

        let workspace = manager.get_or_create(10, true).await.unwrap();
        let project = store.get_project(10).await.unwrap().unwrap();

        assert!(manager.terminate_resources(&project).await.unwrap());
        assert!(!workspace.root().exists());
        assert!(store.get_project(10).await.unwrap().unwrap().workspace_id.is_none());

        assert!(!manager.destroy_resources(&project).await.unwrap());

        let fresh = manager.get_or_create(10, true).await.unwrap();
        assert_ne!(fresh.id(), workspace.id());
    }

    #[tokio::test]
    async fn test_terminate_without_workspace_is_noop() {
        let dir = tempdir().unwrap();
        let (store, manager) = setup(&dir).await;
        let project = store.get_project(10).await.unwrap().unwrap();
        assert!(!manager.terminate_resources(&project).await.unwrap());
    }

    #[tokio::test]
    async fn test_prepare_runs_init_command() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let (_store, manager) = setup(&dir).await;

        let stack = stack(2, Some("echo ready > marker.txt"));
        let (workspace, id) = manager.prepare(&stack).await.unwrap();
        assert_eq!(workspace.id(), id);
        assert!(workspace.project_id().is_none());
        let marker = workspace.read_file("/app/marker.txt", false).await.unwrap();
        assert_eq!(marker, "ready\n");
    }

    #[tokio::test]
    async fn test_read_project_file() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let (store, manager) = setup(&dir).await;

        let project = store.get_project(10).await.unwrap().unwrap();
        assert!(manager
            .read_project_file(&project, "/app/a.txt")
            .await
            .unwrap()
            .is_none());

        let workspace = manager.get_or_create(10, true).await.unwrap();
        workspace
            .write_files_and_commit([("/app/a.txt", "hello")], "Add a")
            .await
            .unwrap();

        let project = store.get_project(10).await.unwrap().unwrap();
        let content = manager.read_project_file(&project, "/app/a.txt").await.unwrap();
        assert_eq!(content.as_deref(), Some(b"hello".as_slice()));
        assert!(manager
            .read_project_file(&project, "/app/missing.txt")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_workspace_root_rejects_nested_ids() {
        let dir = tempdir().unwrap();
        let manager = SandboxManager::new(Arc::new(MemoryStore::new()), config(&dir));
        assert!(manager.workspace("abc-123").is_ok());
        assert!(manager.workspace("../etc").is_err());
        assert!(manager.workspace("a/b").is_err());
        assert!(manager.workspace("").is_err());
    }

    /// Store that refuses to record workspace ids.
    struct FailingStore(MemoryStore);

    #[async_trait]
    impl ProjectStore for FailingStore {
        async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
            self.0.get_project(id).await
        }
        async fn get_stack(&self, id: StackId) -> Result<Option<Stack>> {
            self.0.get_stack(id).await
        }
        async fn list_stacks(&self) -> Result<Vec<Stack>> {
            self.0.list_stacks().await
        }
        async fn set_project_workspace_id(&self, _id: ProjectId, _workspace_id: &str) -> Result<()> {
            anyhow::bail!("database is locked")
        }
        async fn clear_project_workspace_id(&self, id: ProjectId) -> Result<()> {
            self.0.clear_project_workspace_id(id).await
        }
        async fn list_projects_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Project>> {
            self.0.list_projects_inactive_since(cutoff).await
        }
        async fn insert_prepared_workspace(
            &self,
            stack_id: StackId,
            workspace_id: &str,
            pack_hash: &str,
            created_at: DateTime<Utc>,
        ) -> Result<PreparedWorkspace> {
            self.0
                .insert_prepared_workspace(stack_id, workspace_id, pack_hash, created_at)
                .await
        }
        async fn count_unassigned_prepared_workspaces(&self, stack_id: StackId) -> Result<usize> {
            self.0.count_unassigned_prepared_workspaces(stack_id).await
        }
        async fn list_prepared_workspaces(&self, stack_id: StackId) -> Result<Vec<PreparedWorkspace>> {
            self.0.list_prepared_workspaces(stack_id).await
        }
        async fn delete_prepared_workspace(&self, id: i64) -> Result<()> {
            self.0.delete_prepared_workspace(id).await
        }
        async fn claim_prepared_workspace(
            &self,
            stack_id: StackId,
            pack_hash: &str,
        ) -> Result<Option<PreparedWorkspace>> {
            self.0.claim_prepared_workspace(stack_id, pack_hash).await
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates_and_removes_directory() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let inner = MemoryStore::new();
        inner.upsert_stack(stack(1, None)).await;
        inner.upsert_project(Project::new(10, 1)).await;
        let manager = SandboxManager::new(Arc::new(FailingStore(inner)), config(&dir));

        let err = manager.get_or_create(10, true).await.unwrap_err();
        assert!(err.is_store());
        assert_eq!(err.to_string(), "database is locked");
        assert_eq!(workspace_dirs(&dir), 0);
        assert!(manager.locks().lock_for(&10).try_lock().is_ok());
    }
}
