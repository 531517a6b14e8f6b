//! Sandpit: per-project development sandboxes.
//!
//! Each project gets an isolated, git-versioned workspace directory where
//! generated files are written and committed and where commands run.
//! Workspaces are allocated lazily under a per-project lock, handed out from
//! a warm pool of pre-initialized workspaces when one matches, and reclaimed
//! once the project has been inactive past the retention window.
//!
//! - [`sandbox`]: the manager and workspace handle
//! - [`locks`]: keyed async locks serializing per-project allocation
//! - [`tasks`]: warm pool maintenance and inactivity reclamation
//! - [`store`]: the project/stack store interface and its implementations

pub mod config;
pub mod locks;
pub mod sandbox;
pub mod stacks;
pub mod store;
pub mod tasks;
pub mod templates;
