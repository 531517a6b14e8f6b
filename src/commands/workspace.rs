//! Per-project workspace commands: `open`, `ls`, `exec`, `cat`, `write`,
//! `log` and `destroy`.

use anyhow::{anyhow, Context as _, Result};
use chrono::Utc;
use colored::Colorize;
use futures_util::StreamExt;
use std::io::{Read, Write};

use super::Context;
use sandpit::sandbox::{OutputChannel, Workspace};
use sandpit::store::{Project, ProjectId, ProjectStore};

async fn load_project(ctx: &Context, id: ProjectId) -> Result<Project> {
    ctx.store
        .get_project(id)
        .await?
        .ok_or_else(|| anyhow!("Project {id} does not exist"))
}

/// Workspace of a project that already has one.
async fn existing(ctx: &Context, id: ProjectId) -> Result<Workspace> {
    Ok(ctx.manager().get_or_create(id, false).await?)
}

/// Returns the project's workspace, allocating one unless `no_create`, and
/// records the access.
pub(crate) async fn open(ctx: &Context, id: ProjectId, no_create: bool) -> Result<()> {
    let workspace = ctx.manager().get_or_create(id, !no_create).await?;

    let mut project = load_project(ctx, id).await?;
    project.last_accessed = Utc::now();
    ctx.store.upsert_project(project).await?;

    println!("{} {}", "workspace".dimmed(), workspace.id().cyan());
    println!("{} {}", "root     ".dimmed(), workspace.root().display());
    Ok(())
}

/// Lists workspace files, prefixed, one per line or as a JSON array.
pub(crate) async fn ls(ctx: &Context, id: ProjectId, json: bool) -> Result<()> {
    let paths = existing(ctx, id).await?.list_file_paths().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
    } else {
        for path in &paths {
            println!("{path}");
        }
    }
    Ok(())
}

/// Runs a command in the workspace and exits with its status.
///
/// With `follow`, output lines are printed as they arrive.
pub(crate) async fn exec(
    ctx: &Context,
    id: ProjectId,
    args: &[String],
    workdir: Option<&str>,
    follow: bool,
) -> Result<i32> {
    let workspace = existing(ctx, id).await?;
    let command = match args {
        [single] => single.clone(),
        _ => shell_words::join(args),
    };

    if follow {
        let mut lines = workspace.run_command_stream(&command, workdir, OutputChannel::Both)?;
        while let Some(line) = lines.next().await {
            println!("{}", line?);
        }
        let code = lines.exit_status().and_then(|status| status.code());
        return Ok(code.unwrap_or(1));
    }

    let output = workspace.run_command_output(&command, workdir).await?;
    print!("{}", output.stdout);
    eprint!("{}", output.stderr);
    Ok(output.exit_code.unwrap_or(1))
}

/// Prints a workspace file. Reads without allocating.
pub(crate) async fn cat(ctx: &Context, id: ProjectId, path: &str) -> Result<()> {
    let project = load_project(ctx, id).await?;
    let content = ctx
        .manager()
        .read_project_file(&project, path)
        .await?
        .ok_or_else(|| anyhow!("File not found: {path}"))?;

    std::io::stdout()
        .write_all(&content)
        .context("Failed to write to stdout")?;
    Ok(())
}

/// Writes stdin to `path` in the workspace and commits it.
pub(crate) async fn write(ctx: &Context, id: ProjectId, path: &str, message: &str) -> Result<()> {
    let workspace = existing(ctx, id).await?;

    let mut content = Vec::new();
    std::io::stdin()
        .read_to_end(&mut content)
        .context("Failed to read stdin")?;

    match workspace
        .write_files_and_commit([(path, content)], message)
        .await?
    {
        Some(hash) => println!("{} {} {}", "✓".green(), hash.cyan(), message),
        None => println!("{} No changes", "ℹ".blue()),
    }
    Ok(())
}

/// Prints the workspace changelog.
pub(crate) async fn log(ctx: &Context, id: ProjectId) -> Result<()> {
    let workspace = existing(ctx, id).await?;
    let changelog = workspace
        .read_file(&ctx.config.workspace.changelog_file, true)
        .await?;

    for line in changelog.lines() {
        let mut fields = line.splitn(5, '|');
        let (Some(hash), Some(subject), Some(author)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let date = fields.nth(1).unwrap_or_default();
        println!("{} {} {} {}", hash.yellow(), subject, author.dimmed(), date.dimmed());
    }
    Ok(())
}

/// Destroys the project's workspace storage.
pub(crate) async fn destroy(ctx: &Context, id: ProjectId) -> Result<()> {
    let project = load_project(ctx, id).await?;
    if ctx.manager().destroy_resources(&project).await? {
        println!("{} Workspace of project {} destroyed", "✓".green(), id.to_string().cyan());
    } else {
        println!("{} Project {} has no workspace", "ℹ".blue(), id);
    }
    Ok(())
}
