//! `stacks` and `seed-stacks`.

use anyhow::Result;
use colored::Colorize;
use tracing::info;

use super::Context;
use sandpit::stacks::default_packs;
use sandpit::store::ProjectStore;

/// Lists stored stacks with their pack hash and warm pool size.
pub(crate) async fn list(ctx: &Context) -> Result<()> {
    let mut stacks = ctx.store.list_stacks().await?;
    if stacks.is_empty() {
        println!("\n{} No stacks registered.", "ℹ".blue());
        println!("  Run {} to add the built-in ones.", "sandpit seed-stacks".green());
        return Ok(());
    }
    stacks.sort_by_key(|s| s.id);

    println!();
    for stack in &stacks {
        let ready = ctx
            .store
            .count_unassigned_prepared_workspaces(stack.id)
            .await?;
        println!(
            "  {:>3}  {:<16} {}  {} ready",
            stack.id.to_string().cyan(),
            stack.title.bold(),
            stack.pack_hash.dimmed(),
            ready
        );
        if !stack.description.is_empty() {
            println!("       {}", stack.description.dimmed());
        }
    }
    Ok(())
}

/// Upserts the built-in stack packs, matched by title.
pub(crate) async fn seed(ctx: &Context) -> Result<()> {
    println!();
    for pack in default_packs() {
        let stack = ctx.store.upsert_stack_by_title(pack.to_stack(0)).await?;
        info!(stack_id = stack.id, title = %stack.title, pack_hash = %stack.pack_hash, "stack seeded");
        println!(
            "  {} {} ({})",
            "✓".green(),
            stack.title.bold(),
            stack.pack_hash.dimmed()
        );
    }
    println!("\nRun {} to prepare workspaces.", "sandpit maintain-pool".green());
    Ok(())
}
