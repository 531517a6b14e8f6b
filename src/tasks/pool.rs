//! Warm pool maintenance.
//!
//! Keeps `target_size` unassigned, already-initialized workspaces per stack
//! so allocating a workspace for a new project skips the stack's setup.
//! Only boots what is missing; entries prepared under an outdated pack hash
//! are retired first.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::sandbox::{SandboxError, SandboxManager, SandboxResult};
use crate::store::{PreparedWorkspace, Stack, StackId};

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Workspaces prepared and recorded.
    pub created: usize,
    /// Stale entries removed.
    pub retired: usize,
    /// Stacks whose top-up stopped on an error.
    pub failed_stacks: Vec<StackId>,
}

/// Tops up the warm pool, one pass per [`PoolMaintainer::run`].
#[derive(Debug, Clone)]
pub struct PoolMaintainer {
    manager: Arc<SandboxManager>,
    target_size: usize,
}

impl PoolMaintainer {
    /// Maintainer using the manager's configured target size.
    pub fn new(manager: Arc<SandboxManager>) -> Self {
        let target_size = manager.config().pool.target_size;
        Self {
            manager,
            target_size,
        }
    }

    /// Overrides the per-stack target.
    #[must_use]
    pub fn with_target_size(mut self, target_size: usize) -> Self {
        self.target_size = target_size;
        self
    }

    /// Runs one pass over every stack.
    ///
    /// A failure stops that stack for this pass and moves on to the next;
    /// nothing is retried until the next pass. Never returns an error.
    pub async fn run(&self) -> PoolReport {
        let mut report = PoolReport::default();

        let stacks = match self.manager.store().list_stacks().await {
            Ok(stacks) => stacks,
            Err(e) => {
                error!(error = %e, "failed to list stacks for pool maintenance");
                return report;
            }
        };

        for stack in &stacks {
            if let Err(e) = self.maintain_stack(stack, &mut report).await {
                warn!(stack_id = stack.id, error = %e, "failed to top up warm pool");
                report.failed_stacks.push(stack.id);
            }
        }

        if report.created > 0 || report.retired > 0 {
            info!(
                created = report.created,
                retired = report.retired,
                failed = report.failed_stacks.len(),
                "warm pool maintained"
            );
        }
        report
    }

    async fn maintain_stack(&self, stack: &Stack, report: &mut PoolReport) -> SandboxResult<()> {
        report.retired += self.retire_stale(stack).await?;

        let mut count = self
            .manager
            .store()
            .count_unassigned_prepared_workspaces(stack.id)
            .await
            .map_err(SandboxError::Store)?;

        while count < self.target_size {
            self.prepare_one(stack).await?;
            count += 1;
            report.created += 1;
        }
        Ok(())
    }

    async fn prepare_one(&self, stack: &Stack) -> SandboxResult<PreparedWorkspace> {
        let (_, workspace_id) = self.manager.prepare(stack).await?;

        match self
            .manager
            .store()
            .insert_prepared_workspace(stack.id, &workspace_id, &stack.pack_hash, chrono::Utc::now())
            .await
        {
            Ok(row) => {
                info!(stack_id = stack.id, workspace_id = %workspace_id, "prepared workspace added to pool");
                Ok(row)
            }
            Err(e) => {
                if let Err(cleanup) = self.manager.discard_workspace(&workspace_id).await {
                    warn!(workspace_id = %workspace_id, error = %cleanup, "failed to remove unrecorded workspace");
                }
                Err(SandboxError::Store(e))
            }
        }
    }

    /// Removes entries prepared under a different pack hash than the stack's.
    async fn retire_stale(&self, stack: &Stack) -> SandboxResult<usize> {
        let store = self.manager.store();
        let rows = store
            .list_prepared_workspaces(stack.id)
            .await
            .map_err(SandboxError::Store)?;

        let mut retired = 0;
        for row in rows.iter().filter(|r| r.pack_hash != stack.pack_hash) {
            self.manager.discard_workspace(&row.workspace_id).await?;
            store
                .delete_prepared_workspace(row.id)
                .await
                .map_err(SandboxError::Store)?;
            info!(
                stack_id = stack.id,
                workspace_id = %row.workspace_id,
                "retired stale prepared workspace"
            );
            retired += 1;
        }
        Ok(retired)
    }
}
