//! Inactivity reclamation.
//!
//! Destroys the workspace storage of projects nobody has touched within the
//! retention period, then drops inactive in-memory sessions and dead lock
//! entries. The projects themselves stay; their next use allocates a fresh
//! workspace.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::sessions::SessionRegistry;
use crate::sandbox::SandboxManager;
use crate::store::ProjectId;

/// Outcome of one reclamation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Projects whose workspace storage was removed.
    pub reclaimed: Vec<ProjectId>,
    /// Inactive projects exempt from cleanup.
    pub skipped: usize,
    /// Projects whose teardown failed.
    pub failed: Vec<ProjectId>,
    /// Session managers dropped.
    pub sessions_closed: usize,
    /// Dead lock entries pruned.
    pub locks_pruned: usize,
}

/// Periodic cleanup of inactive projects.
#[derive(Debug, Clone)]
pub struct Reclaimer {
    manager: Arc<SandboxManager>,
    sessions: Arc<SessionRegistry>,
    retention: Duration,
}

impl Reclaimer {
    /// Reclaimer using the manager's configured retention.
    pub fn new(manager: Arc<SandboxManager>, sessions: Arc<SessionRegistry>) -> Self {
        let retention = manager.config().reclaim.retention();
        Self {
            manager,
            sessions,
            retention,
        }
    }

    /// Overrides the retention period. Projects idle strictly longer than
    /// this are reclaimed.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Runs one pass against the current time.
    pub async fn run(&self) -> ReclaimReport {
        self.run_at(Utc::now()).await
    }

    /// Runs one pass as if the time were `now`.
    ///
    /// A project is inactive when `last_accessed < now - retention`; a
    /// project exactly at the cutoff is kept. Individual failures are
    /// logged and do not stop the pass.
    pub async fn run_at(&self, now: DateTime<Utc>) -> ReclaimReport {
        let mut report = ReclaimReport::default();
        let cutoff = now - self.retention;

        match self.manager.store().list_projects_inactive_since(cutoff).await {
            Ok(projects) => {
                for project in &projects {
                    if project.never_cleanup {
                        report.skipped += 1;
                        continue;
                    }
                    match self.manager.terminate_resources(project).await {
                        Ok(true) => {
                            info!(
                                project_id = project.id,
                                last_accessed = %project.last_accessed,
                                "reclaimed inactive workspace"
                            );
                            report.reclaimed.push(project.id);
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!(project_id = project.id, error = %e, "failed to reclaim workspace");
                            report.failed.push(project.id);
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "failed to list inactive projects");
            }
        }

        report.sessions_closed = self.sessions.prune_inactive().await;
        report.locks_pruned = self.manager.locks().prune();

        if !report.reclaimed.is_empty() || report.sessions_closed > 0 {
            info!(
                reclaimed = report.reclaimed.len(),
                skipped = report.skipped,
                failed = report.failed.len(),
                sessions_closed = report.sessions_closed,
                "reclamation pass complete"
            );
        }
        report
    }
}
