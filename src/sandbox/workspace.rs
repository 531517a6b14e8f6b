//! A handle to one allocated workspace and the I/O scoped to it.

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::error::{SandboxError, SandboxResult};
use super::{git, paths};
use crate::config::Config;
use crate::store::ProjectId;

/// Output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit code, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }

    /// True when the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Which output of a streamed command to yield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputChannel {
    /// Standard output only.
    Stdout,
    /// Standard error only. Dev servers report progress here.
    #[default]
    Stderr,
    /// Both, interleaved in arrival order.
    Both,
}

/// One piece of a streamed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChunk {
    /// Decoded text (text mode).
    Text(String),
    /// Raw bytes (binary mode).
    Binary(Bytes),
}

/// Lazily produced output lines of a running command.
///
/// Once the stream has ended, [`CommandStream::exit_status`] reports how the
/// process exited.
pub struct CommandStream {
    lines: BoxStream<'static, SandboxResult<String>>,
    exit: Arc<OnceLock<ExitStatus>>,
}

impl CommandStream {
    /// Exit status of the process, `None` until the stream has been drained.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit.get().copied()
    }
}

impl Stream for CommandStream {
    type Item = SandboxResult<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.lines.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for CommandStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandStream")
            .field("exit", &self.exit.get())
            .finish_non_exhaustive()
    }
}

/// Lazily produced file chunks.
pub type ChunkStream = BoxStream<'static, SandboxResult<FileChunk>>;

/// An allocated workspace: a root directory holding a git repository.
///
/// Handles are cheap to clone; two handles with the same id address the
/// same files.
#[derive(Debug, Clone)]
pub struct Workspace {
    id: String,
    project_id: Option<ProjectId>,
    root: PathBuf,
    ready: bool,
    config: Arc<Config>,
}

impl Workspace {
    pub(crate) fn new(
        id: String,
        project_id: Option<ProjectId>,
        root: PathBuf,
        config: Arc<Config>,
    ) -> Self {
        Self {
            id,
            project_id,
            root,
            ready: true,
            config,
        }
    }

    /// Workspace identity.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owning project, `None` for unassigned pool workspaces.
    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    /// Root directory on the host.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the workspace can serve requests. Local workspaces are up as
    /// soon as their directory exists.
    pub async fn is_up(&self) -> bool {
        self.ready && tokio::fs::try_exists(&self.root).await.unwrap_or(false)
    }

    /// Marks the workspace ready.
    pub async fn wait_for_up(&mut self) {
        self.ready = true;
    }

    /// Resolves a caller path (optionally carrying the workspace prefix)
    /// to a host path under the root.
    pub fn resolve(&self, path: &str) -> SandboxResult<PathBuf> {
        paths::resolve(&self.root, &self.config.workspace.path_prefix, path)
    }

    /// Every file in the workspace except ignored segments, sorted and
    /// prefixed (`/app/src/App.tsx`).
    pub async fn list_file_paths(&self) -> SandboxResult<Vec<String>> {
        let prefix = &self.config.workspace.path_prefix;
        let files = paths::list_files(&self.root, &self.config.workspace.ignore).await?;
        Ok(files.into_iter().map(|f| format!("{prefix}{f}")).collect())
    }

    /// Runs `command` through `sh -c` and returns stdout followed by stderr.
    ///
    /// A non-zero exit status is not an error; only failing to spawn is.
    pub async fn run_command(&self, command: &str, working_dir: Option<&str>) -> SandboxResult<String> {
        Ok(self.run_command_output(command, working_dir).await?.combined())
    }

    /// Runs `command` and returns its captured streams and exit code.
    pub async fn run_command_output(
        &self,
        command: &str,
        working_dir: Option<&str>,
    ) -> SandboxResult<CommandOutput> {
        let cwd = self.working_dir(working_dir)?;
        debug!(workspace_id = %self.id, cwd = %cwd.display(), command, "running command");

        let output = shell(command, &cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SandboxError::execution_failure(command, e))?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        debug!(workspace_id = %self.id, exit_code = ?result.exit_code, "command finished");
        Ok(result)
    }

    /// Runs `command` and yields lines from `channel` as they arrive, until
    /// the process exits. Lines carry no trailing newline.
    ///
    /// The unselected stream is sent to the null device. Dropping the
    /// stream kills the process. A non-zero exit is not an error; read it
    /// from [`CommandStream::exit_status`] after the last line.
    pub fn run_command_stream(
        &self,
        command: &str,
        working_dir: Option<&str>,
        channel: OutputChannel,
    ) -> SandboxResult<CommandStream> {
        let cwd = self.working_dir(working_dir)?;
        debug!(workspace_id = %self.id, cwd = %cwd.display(), command, ?channel, "streaming command");

        let (stdout, stderr) = match channel {
            OutputChannel::Stdout => (Stdio::piped(), Stdio::null()),
            OutputChannel::Stderr => (Stdio::null(), Stdio::piped()),
            OutputChannel::Both => (Stdio::piped(), Stdio::piped()),
        };

        let mut child = shell(command, &cwd)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::execution_failure(command, e))?;

        let out_lines = child.stdout.take().map(|s| lines(s).boxed());
        let err_lines = child.stderr.take().map(|s| lines(s).boxed());
        let merged = match (out_lines, err_lines) {
            (Some(out), Some(err)) => stream::select(out, err).boxed(),
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => stream::empty().boxed(),
        };

        let exit = Arc::new(OnceLock::new());
        let state = StreamState {
            lines: merged,
            child: Some(child),
            command: command.to_string(),
            exit: Arc::clone(&exit),
        };
        Ok(CommandStream {
            lines: stream::unfold(state, next_line).boxed(),
            exit,
        })
    }

    /// Writes every `(path, content)` pair, then commits with `message`.
    ///
    /// Each file is written to a temp sibling and renamed into place, so
    /// readers see either the old or the new content. The set as a whole is
    /// not atomic: a failure part-way leaves earlier files written and
    /// uncommitted, and [`Workspace::commit`] can be retried on its own.
    pub async fn write_files_and_commit<I, P, C>(
        &self,
        files: I,
        message: &str,
    ) -> SandboxResult<Option<String>>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<[u8]>,
    {
        let mut written = 0usize;
        for (path, content) in files {
            let target = self.resolve(path.as_ref())?;
            write_atomic(&target, content.as_ref()).await?;
            written += 1;
        }
        debug!(workspace_id = %self.id, files = written, "files written");

        self.commit(message).await
    }

    /// Stages all changes, commits them, and regenerates the changelog.
    ///
    /// Returns the new short hash, or `None` when there was nothing to
    /// commit. The changelog is rewritten either way.
    pub async fn commit(&self, message: &str) -> SandboxResult<Option<String>> {
        let committed = git::commit_all(&self.root, message).await?;

        let log = git::changelog(&self.root, self.config.workspace.changelog_entries).await?;
        let changelog = self.root.join(&self.config.workspace.changelog_file);
        tokio::fs::write(&changelog, log)
            .await
            .map_err(|e| SandboxError::io(&changelog, e))?;

        if !committed {
            return Ok(None);
        }
        let hash = git::current_commit_hash(&self.root).await?;
        info!(workspace_id = %self.id, commit = ?hash, subject = message, "workspace committed");
        Ok(hash)
    }

    /// Reads a file as text. A missing file yields an empty string when
    /// `missing_ok`, otherwise [`SandboxError::NotFound`].
    pub async fn read_file(&self, path: &str, missing_ok: bool) -> SandboxResult<String> {
        let full = self.resolve(path)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && missing_ok => Ok(String::new()),
            Err(e) => Err(SandboxError::io(&full, e)),
        }
    }

    /// Streams a file in fixed-size chunks. Fails immediately with
    /// [`SandboxError::NotFound`] if the file does not exist.
    ///
    /// In text mode multi-byte characters split across chunk boundaries are
    /// carried into the next chunk; invalid sequences are replaced.
    pub async fn stream_file(&self, path: &str, binary: bool) -> SandboxResult<ChunkStream> {
        let full = self.resolve(path)?;
        let file = tokio::fs::File::open(&full)
            .await
            .map_err(|e| SandboxError::io(&full, e))?;

        let state = ChunkState {
            file: Some(file),
            path: full,
            chunk_size: self.config.workspace.chunk_size.max(1),
            binary,
            pending: Vec::new(),
        };
        Ok(stream::unfold(state, next_chunk).boxed())
    }

    fn working_dir(&self, working_dir: Option<&str>) -> SandboxResult<PathBuf> {
        match working_dir {
            Some(dir) => self.resolve(dir),
            None => Ok(self.root.clone()),
        }
    }
}

fn shell(command: &str, cwd: &Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(cwd);
    cmd
}

async fn write_atomic(target: &Path, content: &[u8]) -> SandboxResult<()> {
    let parent = target
        .parent()
        .ok_or_else(|| SandboxError::invalid_path(target.display().to_string()))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| SandboxError::io(parent, e))?;

    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| SandboxError::invalid_path(target.display().to_string()))?;
    let tmp = parent.join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    if let Err(e) = tokio::fs::write(&tmp, content).await {
        return Err(SandboxError::io(&tmp, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(SandboxError::io(target, e));
    }
    Ok(())
}

fn lines<R>(reader: R) -> impl futures_util::Stream<Item = std::io::Result<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::unfold(Some(BufReader::new(reader).lines()), |state| async move {
        let mut lines = state?;
        match lines.next_line().await {
            Ok(Some(line)) => Some((Ok(line), Some(lines))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
}

struct StreamState {
    lines: BoxStream<'static, std::io::Result<String>>,
    child: Option<Child>,
    command: String,
    exit: Arc<OnceLock<ExitStatus>>,
}

async fn next_line(mut state: StreamState) -> Option<(SandboxResult<String>, StreamState)> {
    match state.lines.next().await {
        Some(Ok(line)) => Some((Ok(line), state)),
        Some(Err(e)) => {
            let err = SandboxError::execution_failure(state.command.clone(), e);
            Some((Err(err), state))
        }
        None => {
            if let Some(mut child) = state.child.take() {
                match child.wait().await {
                    Ok(status) => {
                        debug!(command = %state.command, %status, "streamed command exited");
                        let _ = state.exit.set(status);
                    }
                    Err(e) => warn!(command = %state.command, error = %e, "failed to reap streamed command"),
                }
            }
            None
        }
    }
}

struct ChunkState {
    file: Option<tokio::fs::File>,
    path: PathBuf,
    chunk_size: usize,
    binary: bool,
    pending: Vec<u8>,
}

async fn next_chunk(mut state: ChunkState) -> Option<(SandboxResult<FileChunk>, ChunkState)> {
    loop {
        let Some(file) = state.file.as_mut() else {
            // End of file: flush any undecodable tail.
            if state.pending.is_empty() {
                return None;
            }
            let text = String::from_utf8_lossy(&state.pending).into_owned();
            state.pending.clear();
            return Some((Ok(FileChunk::Text(text)), state));
        };

        let mut buf = vec![0u8; state.chunk_size];
        let n = match file.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                state.file = None;
                state.pending.clear();
                let err = SandboxError::io(&state.path, e);
                return Some((Err(err), state));
            }
        };
        if n == 0 {
            state.file = None;
            continue;
        }
        buf.truncate(n);

        if state.binary {
            return Some((Ok(FileChunk::Binary(Bytes::from(buf))), state));
        }

        state.pending.extend_from_slice(&buf);
        if let Some(text) = take_utf8(&mut state.pending) {
            return Some((Ok(FileChunk::Text(text)), state));
        }
    }
}

/// Takes the longest decodable prefix of `pending`, leaving an incomplete
/// trailing sequence in place. Invalid sequences are replaced.
fn take_utf8(pending: &mut Vec<u8>) -> Option<String> {
    let split = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };
    if split == 0 {
        return None;
    }
    let rest = pending.split_off(split);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitConfig;
    use crate::sandbox::git::git_available;
    use tempfile::{tempdir, TempDir};

    fn workspace(dir: &TempDir) -> Workspace {
        workspace_with(dir, Config::default())
    }

    fn workspace_with(dir: &TempDir, config: Config) -> Workspace {
        Workspace::new(
            "ws-test".to_string(),
            Some(1),
            dir.path().to_path_buf(),
            Arc::new(config),
        )
    }

    async fn collect_text(mut chunks: ChunkStream) -> (String, usize) {
        let mut text = String::new();
        let mut count = 0;
        while let Some(chunk) = chunks.next().await {
            match chunk.unwrap() {
                FileChunk::Text(t) => text.push_str(&t),
                FileChunk::Binary(_) => panic!("expected text chunk"),
            }
            count += 1;
        }
        (text, count)
    }

    #[tokio::test]
    async fn test_is_up_follows_directory() {
        let dir = tempdir().unwrap();
        let mut ws = workspace(&dir);
        ws.wait_for_up().await;
        assert!(ws.is_up().await);

        let gone = workspace_with(&dir, Config::default());
        drop(dir);
        assert!(!gone.is_up().await);
    }

    #[tokio::test]
    async fn test_read_file_missing_semantics() {
        let dir = tempdir().unwrap();
        let ws = workspace(&dir);

        let err = ws.read_file("/app/missing.txt", false).await.unwrap_err();
        assert!(err.is_not_found());

        let content = ws.read_file("/app/missing.txt", true).await.unwrap();
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn test_list_file_paths_prefixed_and_sorted() {
        let dir = tempdir().unwrap();
        for file in ["src/b.ts", "src/a.ts", "node_modules/x/index.js", "README.md"] {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "x").unwrap();
        }

        let paths = workspace(&dir).list_file_paths().await.unwrap();
        assert_eq!(paths, vec!["/app/README.md", "/app/src/a.ts", "/app/src/b.ts"]);
    }

    #[tokio::test]
    async fn test_run_command_returns_stdout_then_stderr() {
        let dir = tempdir().unwrap();
        let ws = workspace(&dir);

        let out = ws
            .run_command("echo out; echo err 1>&2; exit 3", None)
            .await
            .unwrap();
        assert_eq!(out, "out\nerr\n");

        let output = ws.run_command_output("exit 3", None).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_run_command_in_subdirectory() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("frontend")).unwrap();
        let ws = workspace(&dir);

        let out = ws.run_command("pwd", Some("/app/frontend")).await.unwrap();
        assert!(out.trim_end().ends_with("frontend"));
    }

    #[tokio::test]
    async fn test_run_command_missing_working_dir_is_execution_failure() {
        let dir = tempdir().unwrap();
        let ws = workspace(&dir);
        let err = ws.run_command("true", Some("does-not-exist")).await.unwrap_err();
        assert!(err.is_execution_failure());
    }

    #[tokio::test]
    async fn test_run_command_stream_defaults_to_stderr() {
        let dir = tempdir().unwrap();
        let ws = workspace(&dir);

        let lines: Vec<String> = ws
            .run_command_stream(
                "echo ignored; echo one 1>&2; echo two 1>&2",
                None,
                OutputChannel::default(),
            )
            .unwrap()
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_run_command_stream_stdout_and_both() {
        let dir = tempdir().unwrap();
        let ws = workspace(&dir);

        let stdout: Vec<String> = ws
            .run_command_stream("echo a; echo b 1>&2", None, OutputChannel::Stdout)
            .unwrap()
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(stdout, vec!["a"]);

        let mut both: Vec<String> = ws
            .run_command_stream("echo a; echo b 1>&2", None, OutputChannel::Both)
            .unwrap()
            .map(|l| l.unwrap())
            .collect()
            .await;
        both.sort();
        assert_eq!(both, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_run_command_stream_reports_exit_status() {
        let dir = tempdir().unwrap();
        let ws = workspace(&dir);

        let mut stream = ws
            .run_command_stream("echo boom 1>&2; exit 3", None, OutputChannel::Both)
            .unwrap();
        assert!(stream.exit_status().is_none());

        let mut lines = Vec::new();
        while let Some(line) = stream.next().await {
            lines.push(line.unwrap());
        }
        assert_eq!(lines, vec!["boom"]);
        assert_eq!(stream.exit_status().and_then(|s| s.code()), Some(3));
    }

    #[tokio::test]
    async fn test_stream_file_missing_fails_immediately() {
        let dir = tempdir().unwrap();
        let ws = workspace(&dir);
        let err = ws.stream_file("nope.txt", false).await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stream_file_chunks() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.workspace.chunk_size = 4;
        let ws = workspace_with(&dir, config);
        std::fs::write(dir.path().join("data.txt"), "0123456789").unwrap();

        let (text, count) = collect_text(ws.stream_file("/app/data.txt", false).await.unwrap()).await;
        assert_eq!(text, "0123456789");
        assert_eq!(count, 3);

        let bytes: Vec<u8> = ws
            .stream_file("data.txt", true)
            .await
            .unwrap()
            .map(|c| match c.unwrap() {
                FileChunk::Binary(b) => b.to_vec(),
                FileChunk::Text(_) => panic!("expected binary chunk"),
            })
            .collect::<Vec<_>>()
            .await
            .concat();
        assert_eq!(bytes, b"0123456789");
    }

    #[tokio::test]
    async fn test_stream_file_keeps_multibyte_characters_whole() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.workspace.chunk_size = 3;
        let ws = workspace_with(&dir, config);
        std::fs::write(dir.path().join("u.txt"), "aé€z").unwrap();

        let (text, _) = collect_text(ws.stream_file("u.txt", false).await.unwrap()).await;
        assert_eq!(text, "aé€z");
    }

    #[test]
    fn test_take_utf8_leaves_incomplete_tail() {
        let mut pending = "a€".as_bytes()[..3].to_vec();
        assert_eq!(take_utf8(&mut pending).as_deref(), Some("a"));
        assert_eq!(pending.len(), 2);
        assert_eq!(take_utf8(&mut pending), None);
    }

    #[tokio::test]
    async fn test_write_files_and_commit_round_trip() {
        if !git_available() {
            return; // Git not available
        }
        let dir = tempdir().unwrap();
        let ws = workspace(&dir);
        git::init_repo(ws.root(), &GitConfig::default(), "git.log")
            .await
            .unwrap();

        let content = "export const answer = 42;\nconst s = \"ünïcødé\";\n";
        let hash = ws
            .write_files_and_commit(
                [("/app/src/lib/answer.ts", content), ("README.md", "# hi\n")],
                "Add answer module",
            )
            .await
            .unwrap();
        assert!(hash.is_some());

        let read = ws.read_file("/app/src/lib/answer.ts", false).await.unwrap();
        assert_eq!(read, content);

        let log = ws.read_file("git.log", false).await.unwrap();
        let first = log.lines().next().unwrap();
        assert_eq!(first.split('|').nth(1), Some("Add answer module"));
        assert_eq!(first.split('|').next(), hash.as_deref());

        ws.write_files_and_commit([("README.md", "# hello\n")], "Update readme")
            .await
            .unwrap();
        let log = ws.read_file("git.log", false).await.unwrap();
        let subjects: Vec<_> = log.lines().map(|l| l.split('|').nth(1).unwrap()).collect();
        assert_eq!(subjects, vec!["Update readme", "Add answer module"]);

        let listed = ws.list_file_paths().await.unwrap();
        assert!(!listed.iter().any(|p| p.ends_with("git.log")));
        assert!(!listed.iter().any(|p| p.contains(".tmp")));
    }

    #[tokio::test]
    async fn test_commit_with_nothing_staged_returns_none() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let ws = workspace(&dir);
        git::init_repo(ws.root(), &GitConfig::default(), "git.log")
            .await
            .unwrap();

        assert!(ws.commit("Empty").await.unwrap().is_none());
        assert!(dir.path().join("git.log").exists());
    }

    #[tokio::test]
    async fn test_write_fails_when_git_cannot_stage() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let ws = workspace(&dir);
        git::init_repo(ws.root(), &GitConfig::default(), "git.log")
            .await
            .unwrap();
        std::fs::write(dir.path().join(".git/index.lock"), "").unwrap();

        let err = ws
            .write_files_and_commit([("a.txt", "hello")], "Add a")
            .await
            .unwrap_err();
        assert!(err.is_git_failure());

        // The file is on disk but nothing reached history.
        assert_eq!(ws.read_file("a.txt", false).await.unwrap(), "hello");
        assert!(!dir.path().join("git.log").exists());
    }

    #[tokio::test]
    async fn test_write_rejects_paths_outside_root() {
        let dir = tempdir().unwrap();
        let ws = workspace(&dir);
        let err = ws
            .write_files_and_commit([("../escape.txt", "x")], "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::InvalidPath { .. }));
    }
}
