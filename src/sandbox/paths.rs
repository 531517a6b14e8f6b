//! Mapping between caller-facing paths and files under a workspace root.

use std::path::{Component, Path, PathBuf};

use super::error::{SandboxError, SandboxResult};

/// Resolves a caller path to a location under `root`.
///
/// Strips `prefix` (e.g. `/app/`) when present, then any leading `/`, so
/// `/app/src/main.ts`, `/src/main.ts` and `src/main.ts` land on the same
/// file. Parent-directory components are rejected.
pub(crate) fn resolve(root: &Path, prefix: &str, path: &str) -> SandboxResult<PathBuf> {
    let relative = strip_prefix(prefix, path).trim_start_matches('/');

    let mut resolved = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(SandboxError::invalid_path(path));
            }
        }
    }
    Ok(resolved)
}

/// Removes the workspace prefix from `path` if present.
pub(crate) fn strip_prefix<'a>(prefix: &str, path: &'a str) -> &'a str {
    if prefix.is_empty() {
        return path;
    }
    path.strip_prefix(prefix).unwrap_or(path)
}

/// True when any component of `relative` equals an ignored segment.
pub(crate) fn is_ignored(relative: &Path, ignore: &[String]) -> bool {
    relative.components().any(|component| match component {
        Component::Normal(part) => ignore.iter().any(|i| part == i.as_str()),
        _ => false,
    })
}

/// Walks `root` and returns every file not filtered by `ignore`, relative to
/// `root`, as `/`-joined strings sorted lexicographically.
///
/// Ignored directories are not descended into. Symlinks are listed but not
/// followed.
pub(crate) async fn list_files(root: &Path, ignore: &[String]) -> SandboxResult<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| SandboxError::io(&dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SandboxError::io(&dir, e))?
        {
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            if is_ignored(relative, ignore) {
                continue;
            }

            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SandboxError::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else {
                files.push(to_slash(relative));
            }
        }
    }

    files.sort();
    Ok(files)
}

fn to_slash(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
