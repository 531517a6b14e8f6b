//! CLI command implementations.
//!
//! Each submodule implements one group of `sandpit` commands. Commands that
//! touch workspaces share a [`Context`]: the loaded configuration and the
//! file store it points at.

pub mod init;
pub mod project;
pub mod stacks;
pub mod tasks;
pub mod workspace;

use anyhow::{Context as _, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use sandpit::config::Config;
use sandpit::sandbox::SandboxManager;
use sandpit::store::FileStore;

/// Configuration and store shared by a command invocation.
pub(crate) struct Context {
    pub(crate) config: Config,
    pub(crate) store: Arc<FileStore>,
}

impl Context {
    /// Loads `config_path` (or `sandpit.toml` in the working directory) and
    /// opens the store it names.
    pub(crate) async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::load_file(path)?,
            None => {
                let cwd = std::env::current_dir().context("Failed to get current directory")?;
                Config::load(&cwd)?
            }
        };

        let store = FileStore::open(&config.store.path).await?;
        debug!(
            store = %config.store.path.display(),
            root = %config.workspace.root.display(),
            "context loaded"
        );

        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    /// A sandbox manager over this context's store.
    pub(crate) fn manager(&self) -> Arc<SandboxManager> {
        Arc::new(SandboxManager::new(self.store.clone(), self.config.clone()))
    }
}
