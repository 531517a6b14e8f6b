//! Per-project development sandboxes.
//!
//! A sandbox is a directory under the configured root, named by its
//! workspace id, holding a git repository. Generated files are written and
//! committed there, and commands (installs, builds, dev servers) run there.
//!
//! - `manager`: allocation and lifecycle, serialized per project
//! - `workspace`: the file and command I/O scoped to one workspace

mod error;
mod git;
mod manager;
mod paths;
mod workspace;

pub use error::{SandboxError, SandboxResult};
pub use git::CHANGELOG_FORMAT;
pub use manager::SandboxManager;

#[cfg(test)]
pub(crate) use git::git_available;
pub use workspace::{
    ChunkStream, CommandOutput, CommandStream, FileChunk, OutputChannel, Workspace,
};
