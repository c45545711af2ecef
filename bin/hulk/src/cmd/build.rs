//! Build command - generates the site once

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use hulk_site::Site;

use super::{display_path, load_config, print_build_stats};

/// Run the build command.
///
/// Reads the source tree, renders every unit, writes the output tree and removes
/// stale files from it.
pub async fn run(
    config_path: &Path,
    source: Option<&Path>,
    destination: Option<&Path>,
) -> Result<()> {
    tracing::info!(?config_path, ?source, ?destination, "Starting build");

    let config = load_config(config_path, source, destination)?;
    tracing::debug!(?config, "Loaded configuration");

    let mut site = Site::new(config).wrap_err("Failed to set up the site")?;
    let stats = site.process().await.wrap_err("Build failed")?;

    if !site.skipped().is_empty() {
        println!();
        println!("  Skipped:");
        for skipped in site.skipped() {
            let path = display_path(site.config(), &skipped.path);
            println!("  ⚠ {}: {}", path.display(), skipped.reason);
        }
    }

    print_build_stats(&stats, &site.config().destination);
    tracing::info!(?stats, "Build completed successfully");

    Ok(())
}
