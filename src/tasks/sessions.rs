//! In-memory registry of live per-project session managers.
//!
//! The reclaimer drops managers that report themselves inactive, shutting
//! each one down before it leaves the registry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::store::ProjectId;

/// A live, in-memory per-project session (agent loop, terminal, etc).
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// True once the session has been idle long enough to be dropped.
    fn is_inactive(&self) -> bool;

    /// Shuts the session down.
    async fn kill(&self) -> anyhow::Result<()>;
}

/// Live session managers keyed by project.
#[derive(Default)]
pub struct SessionRegistry {
    managers: Mutex<HashMap<ProjectId, Arc<dyn SessionManager>>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a manager, returning the one it replaced.
    pub async fn register(
        &self,
        project_id: ProjectId,
        manager: Arc<dyn SessionManager>,
    ) -> Option<Arc<dyn SessionManager>> {
        self.managers.lock().await.insert(project_id, manager)
    }

    /// The manager registered for `project_id`, if any.
    pub async fn get(&self, project_id: ProjectId) -> Option<Arc<dyn SessionManager>> {
        self.managers.lock().await.get(&project_id).cloned()
    }

    /// Removes a manager without shutting it down.
    pub async fn remove(&self, project_id: ProjectId) -> Option<Arc<dyn SessionManager>> {
        self.managers.lock().await.remove(&project_id)
    }

    /// Number of registered managers.
    pub async fn len(&self) -> usize {
        self.managers.lock().await.len()
    }

    /// True when no managers are registered.
    pub async fn is_empty(&self) -> bool {
        self.managers.lock().await.is_empty()
    }

    /// Kills and removes every inactive manager. Returns how many were removed.
    ///
    /// A manager whose shutdown fails is still removed.
    pub async fn prune_inactive(&self) -> usize {
        let mut managers = self.managers.lock().await;

        let inactive: Vec<ProjectId> = managers
            .iter()
            .filter(|(_, m)| m.is_inactive())
            .map(|(id, _)| *id)
            .collect();

        for project_id in &inactive {
            if let Some(manager) = managers.get(project_id) {
                if let Err(e) = manager.kill().await {
                    warn!(project_id, error = %e, "failed to shut down session");
                }
            }
            managers.remove(project_id);
            debug!(project_id, "removed inactive session");
        }

        inactive.len()
    }
}
