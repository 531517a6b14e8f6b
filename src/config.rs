//! Configuration loaded from `sandpit.toml`.
//!
//! Every field has a default, so a missing file (or a missing section)
//! yields a usable configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "sandpit.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Workspace layout and I/O settings.
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Identity used for workspace commits.
    #[serde(default)]
    pub git: GitConfig,
    /// Warm pool settings.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Inactivity reclamation settings.
    #[serde(default)]
    pub reclaim: ReclaimConfig,
    /// File-backed store used by the CLI.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Where workspaces live and how their contents are presented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory under which every workspace gets `<root>/<workspace_id>`.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Prefix presented to callers in front of in-workspace paths
    /// and stripped from incoming paths.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Path components excluded from file listings at any depth.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Changelog file regenerated after every commit.
    #[serde(default = "default_changelog_file")]
    pub changelog_file: String,

    /// Number of commits kept in the changelog.
    #[serde(default = "default_changelog_entries")]
    pub changelog_entries: u32,

    /// Chunk size for streamed file reads, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            path_prefix: default_path_prefix(),
            ignore: default_ignore(),
            changelog_file: default_changelog_file(),
            changelog_entries: default_changelog_entries(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl WorkspaceConfig {
    /// Directory for a given workspace id.
    pub fn workspace_path(&self, workspace_id: &str) -> PathBuf {
        self.root.join(workspace_id)
    }
}

/// Commit identity configured inside each workspace repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// `user.name` for workspace commits
    #[serde(default = "default_git_user_name")]
    pub user_name: String,

    /// `user.email` for workspace commits
    #[serde(default = "default_git_user_email")]
    pub user_email: String,

    /// Initial branch name
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            user_name: default_git_user_name(),
            user_email: default_git_user_email(),
            default_branch: default_branch(),
        }
    }
}

/// Warm pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Unassigned prepared workspaces kept per stack
    #[serde(default = "default_pool_target")]
    pub target_size: usize,

    /// Seconds between maintenance passes when serving
    #[serde(default = "default_pool_interval")]
    pub interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            target_size: default_pool_target(),
            interval_secs: default_pool_interval(),
        }
    }
}

impl PoolConfig {
    /// Interval between maintenance passes.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Inactivity reclamation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclaimConfig {
    /// Projects not accessed for this many days lose their workspace
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Seconds between reclamation passes when serving
    #[serde(default = "default_reclaim_interval")]
    pub interval_secs: u64,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            interval_secs: default_reclaim_interval(),
        }
    }
}

impl ReclaimConfig {
    /// Retention window as a signed duration for cutoff arithmetic.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    /// Interval between reclamation passes.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// File-backed store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the TOML store document
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

// Default value functions
fn default_root() -> PathBuf {
    PathBuf::from("/tmp/promptstudio/sandboxes")
}

fn default_path_prefix() -> String {
    "/app/".to_string()
}

fn default_ignore() -> Vec<String> {
    ["node_modules", ".git", ".next", "build", "git.log", "tmp"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_changelog_file() -> String {
    "git.log".to_string()
}

fn default_changelog_entries() -> u32 {
    50
}

fn default_chunk_size() -> usize {
    8192
}

fn default_git_user_name() -> String {
    "Sandpit Bot".to_string()
}

fn default_git_user_email() -> String {
    "bot@sandpit.local".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_pool_target() -> usize {
    2
}

fn default_pool_interval() -> u64 {
    60
}

fn default_retention_days() -> i64 {
    7
}

fn default_reclaim_interval() -> u64 {
    3600
}

fn default_store_path() -> PathBuf {
    PathBuf::from("sandpit-store.toml")
}

impl Config {
    /// Load configuration from `sandpit.toml` in `dir`, using defaults if not found.
    pub fn load(dir: &Path) -> Result<Self> {
        Self::load_file(&dir.join(CONFIG_FILE))
    }

    /// Load configuration from an explicit file, using defaults if it does not exist.
    pub fn load_file(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.workspace.root = expand_path(&config.workspace.root)?;
        config.store.path = expand_path(&config.store.path)?;

        Ok(config)
    }
}

/// Expand a leading `~` to the home directory.
fn expand_path(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir().context("Could not determine home directory")?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}
