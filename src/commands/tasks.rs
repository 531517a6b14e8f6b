//! `maintain-pool`, `reclaim` and `serve`.

use anyhow::{Context as _, Result};
use colored::Colorize;
use std::sync::Arc;
use tracing::{info, warn};

use super::Context;
use sandpit::tasks::{run_scheduler, PoolMaintainer, Reclaimer, SessionRegistry};

/// Runs one warm pool pass.
pub(crate) async fn maintain_pool(ctx: &Context) -> Result<()> {
    let report = PoolMaintainer::new(ctx.manager()).run().await;

    println!(
        "{} Pool maintained: {} created, {} retired",
        "✓".green(),
        report.created,
        report.retired
    );
    for stack_id in &report.failed_stacks {
        println!("  {} stack {} could not be topped up", "✗".red(), stack_id);
    }
    Ok(())
}

/// Runs one reclamation pass.
pub(crate) async fn reclaim(ctx: &Context) -> Result<()> {
    let reclaimer = Reclaimer::new(ctx.manager(), Arc::new(SessionRegistry::new()));
    let report = reclaimer.run().await;

    println!(
        "{} Reclaimed {} workspace(s), {} kept by never_cleanup",
        "✓".green(),
        report.reclaimed.len(),
        report.skipped
    );
    for project_id in &report.failed {
        println!("  {} project {} could not be reclaimed", "✗".red(), project_id);
    }
    Ok(())
}

/// Runs both passes on their configured intervals until Ctrl-C.
pub(crate) async fn serve(ctx: &Context) -> Result<()> {
    let manager = ctx.manager();
    tokio::fs::create_dir_all(&ctx.config.workspace.root)
        .await
        .with_context(|| {
            format!(
                "Failed to create workspace root: {}",
                ctx.config.workspace.root.display()
            )
        })?;

    let pool = PoolMaintainer::new(manager.clone());
    let reclaimer = Reclaimer::new(manager, Arc::new(SessionRegistry::new()));

    println!(
        "{} Serving (pool every {}s, reclaim every {}s). Press Ctrl-C to stop.",
        "▶".green().bold(),
        ctx.config.pool.interval().as_secs(),
        ctx.config.reclaim.interval().as_secs()
    );

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => {
                warn!(error = %e, "failed to listen for Ctrl-C, running until killed");
                std::future::pending::<()>().await;
            }
        }
    };

    run_scheduler(
        pool,
        reclaimer,
        ctx.config.pool.interval(),
        ctx.config.reclaim.interval(),
        shutdown,
    )
    .await;

    Ok(())
}
