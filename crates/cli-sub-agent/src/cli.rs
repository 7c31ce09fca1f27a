use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "csa", version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Workflow orchestration and policy enforcement runtime")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List episodes from the episodic memory store
    List {
        /// Filter by episode type (deployment, troubleshooting, creation, ...)
        #[arg(long = "type")]
        episode_type: Option<String>,

        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// Print the audit metrics summary for a trailing window
    Stats {
        /// Trailing window size in days
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Export one episode's canonical JSON to a file
    Export {
        /// Episode id
        id: String,

        /// Destination path
        path: std::path::PathBuf,
    },

    /// Import an episode-shaped JSON file into the episodic memory store
    Import {
        /// Source path
        path: std::path::PathBuf,
    },

    /// Remove stale episodes and sessions
    Clean {
        /// Age threshold in days
        #[arg(long, default_value_t = 90)]
        days: i64,
    },

    /// Ensure the on-disk layout exists and is current
    Migrate,

    /// Pre/post tool-hook entry points
    #[command(subcommand)]
    Hook(HookCommands),
}

#[derive(Subcommand)]
pub enum HookCommands {
    /// Evaluate a PreToolUse hook payload read from stdin
    Pre,

    /// Record a PostToolUse hook payload read from stdin
    Post,
}
