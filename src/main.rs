use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "sandpit")]
#[command(
    author,
    version,
    about = "Per-project development sandboxes with a warm pool and inactivity reclamation"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ./sandpit.toml)
    #[arg(short, long, global = true, env = "SANDPIT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default sandpit.toml in the current directory
    Init {
        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// List stacks with their pack hash and warm pool size
    Stacks,

    /// Register or refresh the built-in stacks
    SeedStacks,

    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Show a project's workspace, allocating one if needed
    Open {
        /// Project id
        project: i64,

        /// Fail instead of allocating a workspace
        #[arg(long)]
        no_create: bool,
    },

    /// List files in a project's workspace
    Ls {
        /// Project id
        project: i64,

        /// Print a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Run a command in a project's workspace
    Exec {
        /// Project id
        project: i64,

        /// Working directory inside the workspace
        #[arg(short = 'C', long)]
        workdir: Option<String>,

        /// Print output lines as they arrive
        #[arg(long)]
        follow: bool,

        /// Command to run (a single argument is passed to the shell as is)
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Print a file from a project's workspace
    Cat {
        /// Project id
        project: i64,

        /// Path inside the workspace
        path: String,
    },

    /// Write stdin to a workspace file and commit it
    Write {
        /// Project id
        project: i64,

        /// Path inside the workspace
        path: String,

        /// Commit message
        #[arg(short, long, default_value = "Update file")]
        message: String,
    },

    /// Show a project's workspace changelog
    Log {
        /// Project id
        project: i64,
    },

    /// Delete a project's workspace storage
    Destroy {
        /// Project id
        project: i64,
    },

    /// Top up the warm pool once
    MaintainPool,

    /// Reclaim workspaces of inactive projects once
    Reclaim,

    /// Run pool maintenance and reclamation on their intervals until Ctrl-C
    Serve {
        /// Also write daily-rotated logs to this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Register a project
    Add {
        /// Project id
        id: i64,

        /// Stack id
        #[arg(short, long)]
        stack: i64,

        /// Never reclaim this project's workspace
        #[arg(long)]
        never_cleanup: bool,
    },

    /// List projects
    Ls,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("sandpit=debug")
    } else {
        EnvFilter::new("sandpit=info")
    };

    let (file_layer, _log_guard) = match &cli.command {
        Commands::Serve {
            log_dir: Some(dir), ..
        } => {
            let appender = tracing_appender::rolling::daily(dir, "sandpit.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        return commands::init::run(force);
    }

    let ctx = Context::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Stacks => {
            commands::stacks::list(&ctx).await?;
        }
        Commands::SeedStacks => {
            commands::stacks::seed(&ctx).await?;
        }
        Commands::Project(ProjectCommands::Add {
            id,
            stack,
            never_cleanup,
        }) => {
            commands::project::add(&ctx, id, stack, never_cleanup).await?;
        }
        Commands::Project(ProjectCommands::Ls) => {
            commands::project::list(&ctx).await?;
        }
        Commands::Open { project, no_create } => {
            commands::workspace::open(&ctx, project, no_create).await?;
        }
        Commands::Ls { project, json } => {
            commands::workspace::ls(&ctx, project, json).await?;
        }
        Commands::Exec {
            project,
            workdir,
            follow,
            command,
        } => {
            let code =
                commands::workspace::exec(&ctx, project, &command, workdir.as_deref(), follow)
                    .await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Cat { project, path } => {
            commands::workspace::cat(&ctx, project, &path).await?;
        }
        Commands::Write {
            project,
            path,
            message,
        } => {
            commands::workspace::write(&ctx, project, &path, &message).await?;
        }
        Commands::Log { project } => {
            commands::workspace::log(&ctx, project).await?;
        }
        Commands::Destroy { project } => {
            commands::workspace::destroy(&ctx, project).await?;
        }
        Commands::MaintainPool => {
            commands::tasks::maintain_pool(&ctx).await?;
        }
        Commands::Reclaim => {
            commands::tasks::reclaim(&ctx).await?;
        }
        Commands::Serve { .. } => {
            commands::tasks::serve(&ctx).await?;
        }
    }

    Ok(())
}
