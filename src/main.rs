//! Canopy CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Code-context indexing and retrieval engine for AI coding agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Repository root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the repository and ingest every file into the graph store
    Index,
    /// Fetch a context bundle for one artifact, in TOON
    Query {
        /// The artifact id, e.g. `artifact-0123456789abcdef`
        artifact_id: String,

        /// Maximum DEPENDS_ON traversal depth, 1..=5 (defaults to
        /// canopy.toml's [query].default_max_depth)
        #[arg(long)]
        depth: Option<usize>,

        /// Skip dependency traversal and return only the artifact's own
        /// summary
        #[arg(long)]
        no_deps: bool,
    },
    /// List artifacts structurally identical to the given one
    FindSimilar {
        artifact_id: String,

        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Print graph and Bloom index statistics
    Stats,
    /// Remove the persisted graph snapshot and Bloom index
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("canopy={log_level}")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Canopy v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Repository root: {}", cli.root.display());

    match cli.command {
        Commands::Index => commands::index(cli.root).await,
        Commands::Query { artifact_id, depth, no_deps } => {
            commands::query(cli.root, artifact_id, !no_deps, depth).await
        }
        Commands::FindSimilar { artifact_id, limit } => commands::find_similar(cli.root, artifact_id, limit),
        Commands::Stats => commands::stats(cli.root),
        Commands::Clear => commands::clear(cli.root),
        Commands::Version => {
            println!("Canopy v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
