//! Check command - validate configuration and content

use std::path::Path;

use color_eyre::eyre::{Result, bail};
use hulk_site::Site;

use super::{display_path, load_config};

/// Run the check command.
///
/// Loads the configuration and reads every source file without rendering or
/// writing anything. Files that would be skipped during a build are reported;
/// with `strict` they fail the check.
pub async fn run(config_path: &Path, source: Option<&Path>, strict: bool) -> Result<()> {
    tracing::info!(?config_path, strict, "Checking configuration and content");

    println!("Checking configuration...");
    let config = match load_config(config_path, source, None) {
        Ok(config) => {
            println!("  ✓ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ✗ Configuration invalid: {e:#}");
            return Err(e);
        }
    };

    println!("\nChecking content files...");
    let mut site = Site::new(config)?;
    site.read().await?;

    println!("  ✓ {} layout(s)", site.layouts().len());
    println!("  ✓ {} post(s)", site.posts().len());
    println!("  ✓ {} page(s)", site.pages().len());
    println!("  ✓ {} static file(s)", site.static_files().len());

    let skipped = site.skipped();
    if !skipped.is_empty() {
        println!();
        println!("Skipped:");
        for file in skipped {
            let path = display_path(site.config(), &file.path);
            println!("  ⚠ {}: {}", path.display(), file.reason);
        }
    }

    if strict && !skipped.is_empty() {
        bail!(
            "Validation failed with {} skipped file(s) (strict mode)",
            skipped.len()
        );
    }

    println!();
    println!("✓ All checks passed");

    Ok(())
}
