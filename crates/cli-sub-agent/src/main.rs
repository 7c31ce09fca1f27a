use anyhow::Result;
use clap::Parser;

mod cli;
mod clean_cmd;
mod export_cmd;
mod hook_cmds;
mod import_cmd;
mod list_cmd;
mod migrate_cmd;
mod stats_cmd;

use cli::{Cli, Commands, HookCommands};

fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result = dispatch(cli.command);
    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

/// Always logs to stderr; additionally logs to a daily-rolling file under
/// the project's `logs/` directory when a project root can be resolved, so
/// commands run outside a `.claude`-marked tree still work (stderr only).
fn init_tracing() {
    use tracing_subscriber::prelude::*;

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let file_layer = csa_config::paths::logs_dir().ok().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, "csa.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        // Leaked deliberately: the guard must outlive every subscriber call
        // for the process's lifetime, and this runs once at startup.
        Box::leak(Box::new(guard));
        tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .ok();
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::List { episode_type, tag } => list_cmd::run(episode_type.as_deref(), tag.as_deref()),
        Commands::Stats { days } => stats_cmd::run(days),
        Commands::Export { id, path } => export_cmd::run(&id, &path),
        Commands::Import { path } => import_cmd::run(&path),
        Commands::Clean { days } => clean_cmd::run(days),
        Commands::Migrate => migrate_cmd::run(),
        Commands::Hook(HookCommands::Pre) => hook_cmds::run_pre(),
        Commands::Hook(HookCommands::Post) => hook_cmds::run_post(),
    }
}
