mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use strata::config::StrataConfig;
use strata::memory::types::Scope;
use strata::search::SearchMethod;

#[derive(Parser)]
#[command(name = "strata", version, about = "Scoped memory for AI coding agents")]
struct Cli {
    /// Directory to resolve the project root from (defaults to the current directory)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Path to a config file (defaults to ~/.strata/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the merged memory view as JSON
    Show,
    /// Search memory blocks
    Search {
        query: String,
        /// keyword, semantic, or hybrid
        #[arg(long, default_value = "hybrid")]
        method: SearchMethod,
        #[arg(long)]
        limit: Option<usize>,
        /// Restrict to one scope (global or project)
        #[arg(long)]
        scope: Option<Scope>,
    },
    /// Export both scopes as JSON
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Import blocks from an export file
    Import { file: PathBuf },
    /// Show per-scope statistics
    Stats,
    /// Run database health checks
    Doctor,
    /// Regenerate embeddings with the configured provider
    Reindex {
        #[arg(long)]
        scope: Option<Scope>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => StrataConfig::load_from(path)?,
        None => StrataConfig::load()?,
    };

    // Log to stderr so stdout stays clean for JSON output.
    let filter = EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Command::Show => cli::show::show(&config, &dir).await?,
        Command::Search {
            query,
            method,
            limit,
            scope,
        } => {
            let args = cli::search::SearchArgs {
                query: &query,
                method,
                limit,
                scope,
            };
            cli::search::search(&config, &dir, args).await?;
        }
        Command::Export { output } => cli::export::export(&config, &dir, output.as_deref()).await?,
        Command::Import { file } => cli::import::import(&config, &dir, &file).await?,
        Command::Stats => cli::stats::stats(&config, &dir).await?,
        Command::Doctor => cli::doctor::doctor(&config, &dir).await?,
        Command::Reindex { scope } => cli::reindex::reindex(&config, &dir, scope).await?,
    }

    Ok(())
}
