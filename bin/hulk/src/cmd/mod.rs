//! CLI command implementations.

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use hulk_core::Config;
use hulk_site::BuildStats;

pub mod build;
pub mod check;
pub mod new;
pub mod watch;

/// Load the configuration at `config_path`, or the defaults rooted at the working
/// directory when no such file exists. `--source` and `--destination` win over both.
///
/// Paths are resolved to absolute ones so they compare equal to walked and watched
/// paths.
pub fn load_config(
    config_path: &Path,
    source: Option<&Path>,
    destination: Option<&Path>,
) -> Result<Config> {
    let from_file = config_path.exists();
    let mut config = if from_file {
        Config::load_with_env(config_path)
            .wrap_err_with(|| format!("Failed to load {}", config_path.display()))?
    } else {
        tracing::info!(?config_path, "No configuration file, using defaults");
        Config::default()
    };

    if let Some(source) = source {
        if !from_file && destination.is_none() {
            config.destination = source.join(&config.destination);
        }
        config.source = source.to_path_buf();
    }
    if let Some(destination) = destination {
        config.destination = destination.to_path_buf();
    }

    let cwd = std::env::current_dir().wrap_err("Failed to read the working directory")?;
    config.resolve(&cwd).wrap_err("Invalid configuration")
}

/// Print build statistics in a user-friendly format.
pub fn print_build_stats(stats: &BuildStats, destination: &Path) {
    println!();
    println!("  Build Statistics:");
    println!("  ─────────────────────────────────");
    println!("  Layouts:      {:>6}", stats.layouts);
    println!("  Posts:        {:>6}", stats.posts);
    println!("  Pages:        {:>6}", stats.pages);
    println!("  Static files: {:>6}", stats.static_files);
    println!("  Skipped:      {:>6}", stats.skipped);
    println!("  Removed:      {:>6}", stats.removed);
    println!("  ─────────────────────────────────");
    println!("  Written:      {:>6} files", stats.files_written());
    println!("  Duration:     {:>6}ms", stats.duration_ms);
    println!("  Output:       {}", destination.display());
    println!();
}

/// Path shown to the user, relative to the source root when possible.
pub(crate) fn display_path(config: &Config, path: &Path) -> PathBuf {
    path.strip_prefix(&config.source)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
