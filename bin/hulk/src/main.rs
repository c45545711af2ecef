//! Hulk CLI
//!
//! Builds a static site from a source tree of layouts, posts, pages and assets.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use hulk::cmd::new::NewContent;

/// Command-line interface for Hulk.
#[derive(Parser)]
#[command(name = "hulk", version, about = "A static site generator")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "_config.yml")]
    config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Source directory, overriding the configuration
    #[arg(short, long, global = true)]
    source: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Build the site once
    Build {
        /// Output directory, overriding the configuration
        #[arg(short, long)]
        destination: Option<PathBuf>,
    },
    /// Build, then rebuild whenever the source changes
    Watch,
    /// Validate configuration and content without writing anything
    Check {
        /// Fail when any file would be skipped
        #[arg(long)]
        strict: bool,
    },
    /// Create new content with starter front matter
    New {
        #[command(subcommand)]
        content: NewContent,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    hulk::init_tracing(cli.verbose);
    let source = cli.source.as_deref();

    match cli.command {
        Commands::Build { destination } => {
            hulk::cmd::build::run(&cli.config, source, destination.as_deref()).await?;
        }
        Commands::Watch => {
            hulk::cmd::watch::run(&cli.config, source).await?;
        }
        Commands::Check { strict } => {
            hulk::cmd::check::run(&cli.config, source, strict).await?;
        }
        Commands::New { content } => {
            hulk::cmd::new::run(&cli.config, source, &content)?;
        }
    }

    Ok(())
}
