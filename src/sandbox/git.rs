//! Git operations inside a workspace.
//!
//! Every workspace is a git repository: it is initialized at creation,
//! every write is snapshotted by a commit, and the recent history is
//! mirrored to a plain-text changelog after each commit.

use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::error::{SandboxError, SandboxResult};
use crate::config::GitConfig;

/// `git log` format of a changelog line: short hash, subject, author name,
/// author email, RFC 2822 date.
pub const CHANGELOG_FORMAT: &str = "%h|%s|%aN|%aE|%aD";

/// Output of a git invocation.
#[derive(Debug)]
pub(crate) struct GitOutput {
    pub(crate) success: bool,
    pub(crate) code: Option<i32>,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

/// Run `git <args>` in `cwd`. A non-zero exit is reported, not raised.
pub(crate) async fn git(cwd: &Path, args: &[&str]) -> SandboxResult<GitOutput> {
    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .await
        .map_err(|e| SandboxError::execution_failure(format!("git {}", args.join(" ")), e))?;

    let out = GitOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    if !out.success {
        debug!(args = ?args, stderr = %out.stderr.trim(), "git exited non-zero");
    }
    Ok(out)
}

/// Run `git <args>` in `cwd`, failing with [`SandboxError::GitFailure`] on a
/// non-zero exit.
pub(crate) async fn git_checked(cwd: &Path, args: &[&str]) -> SandboxResult<GitOutput> {
    let out = git(cwd, args).await?;
    if !out.success {
        return Err(SandboxError::git_failure(args.join(" "), out.stderr.trim()));
    }
    Ok(out)
}

/// Initialize a repository in `cwd` unless one already exists.
///
/// Sets the commit identity locally and keeps `changelog_file` out of
/// history via `.git/info/exclude`. Safe to re-run.
pub(crate) async fn init_repo(
    cwd: &Path,
    identity: &GitConfig,
    changelog_file: &str,
) -> SandboxResult<()> {
    if !cwd.join(".git").exists() {
        git_checked(cwd, &["init", "--quiet"]).await?;
        let head = format!("refs/heads/{}", identity.default_branch);
        git_checked(cwd, &["symbolic-ref", "HEAD", &head]).await?;
    }

    git_checked(cwd, &["config", "user.name", &identity.user_name]).await?;
    git_checked(cwd, &["config", "user.email", &identity.user_email]).await?;

    let exclude = cwd.join(".git").join("info").join("exclude");
    let existing = tokio::fs::read_to_string(&exclude)
        .await
        .unwrap_or_default();
    if !existing.lines().any(|line| line.trim() == changelog_file) {
        if let Some(parent) = exclude.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SandboxError::io(parent, e))?;
        }
        let mut content = existing;
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(changelog_file);
        content.push('\n');
        tokio::fs::write(&exclude, content)
            .await
            .map_err(|e| SandboxError::io(&exclude, e))?;
    }

    debug!(path = %cwd.display(), "git repository ready");
    Ok(())
}

/// Stage everything and commit with `message`.
///
/// Returns false when there was nothing to commit. Any git step exiting
/// non-zero is an error.
pub(crate) async fn commit_all(cwd: &Path, message: &str) -> SandboxResult<bool> {
    git_checked(cwd, &["add", "-A"]).await?;

    // `diff --quiet` exits 0 for no changes and 1 for changes.
    let args = ["diff", "--cached", "--quiet"];
    let staged = git(cwd, &args).await?;
    match staged.code {
        Some(0) => {
            debug!(path = %cwd.display(), "nothing to commit");
            return Ok(false);
        }
        Some(1) => {}
        _ => return Err(SandboxError::git_failure(args.join(" "), staged.stderr.trim())),
    }

    git_checked(cwd, &["commit", "--quiet", "-m", message]).await?;
    Ok(true)
}

/// Render the last `limit` commits in [`CHANGELOG_FORMAT`], most recent first.
///
/// An empty repository yields an empty string.
pub(crate) async fn changelog(cwd: &Path, limit: u32) -> SandboxResult<String> {
    let pretty = format!("--pretty={CHANGELOG_FORMAT}");
    let count = limit.to_string();
    let out = git(cwd, &["log", &pretty, "-n", &count]).await?;
    if !out.success {
        return Ok(String::new());
    }
    Ok(out.stdout)
}

/// Get the current commit hash (short format).
pub(crate) async fn current_commit_hash(cwd: &Path) -> SandboxResult<Option<String>> {
    let out = git(cwd, &["rev-parse", "--short", "HEAD"]).await?;
    if !out.success {
        return Ok(None);
    }
    Ok(Some(out.stdout.trim().to_string()))
}

#[cfg(test)]
pub(crate) fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
