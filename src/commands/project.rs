//! `project add` and `project ls`.

use anyhow::{bail, Result};
use colored::Colorize;

use super::Context;
use sandpit::store::{Project, ProjectId, ProjectStore, StackId};

/// Registers a project on an existing stack.
pub(crate) async fn add(
    ctx: &Context,
    id: ProjectId,
    stack_id: StackId,
    never_cleanup: bool,
) -> Result<()> {
    if ctx.store.get_stack(stack_id).await?.is_none() {
        bail!("Stack {stack_id} does not exist (see `sandpit stacks`)");
    }
    if ctx.store.get_project(id).await?.is_some() {
        bail!("Project {id} already exists");
    }

    let mut project = Project::new(id, stack_id);
    project.never_cleanup = never_cleanup;
    ctx.store.upsert_project(project).await?;

    println!(
        "{} Project {} added on stack {}",
        "✓".green(),
        id.to_string().cyan(),
        stack_id.to_string().cyan()
    );
    Ok(())
}

/// Lists projects with their workspace and last access.
pub(crate) async fn list(ctx: &Context) -> Result<()> {
    let mut projects = ctx.store.list_projects().await;
    if projects.is_empty() {
        println!("\n{} No projects.", "ℹ".blue());
        return Ok(());
    }
    projects.sort_by_key(|p| p.id);

    for project in &projects {
        let workspace = project
            .workspace_id
            .as_deref()
            .map_or_else(|| "-".dimmed().to_string(), |w| w.cyan().to_string());
        let pinned = if project.never_cleanup { " (kept)" } else { "" };
        println!(
            "  {:>4}  stack {:<3} {}  {}{}",
            project.id,
            project.stack_id,
            workspace,
            project.last_accessed.format("%Y-%m-%d %H:%M:%S UTC"),
            pinned
        );
    }
    Ok(())
}
