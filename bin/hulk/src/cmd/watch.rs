//! Watch command - rebuild the site whenever the source tree changes

use std::{path::Path, time::Duration};

use color_eyre::eyre::{Result, WrapErr};
use hulk_site::Site;
use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{MetadataKind, ModifyKind},
};
use tokio::sync::mpsc;

use super::{load_config, print_build_stats};

/// Debounce interval for file changes.
const DEBOUNCE_MS: u64 = 200;

/// Run the watch command.
///
/// Builds once, then rebuilds through the same [`Site`] after every burst of changes
/// under the source root until Ctrl+C.
pub async fn run(config_path: &Path, source: Option<&Path>) -> Result<()> {
    tracing::info!(?config_path, "Starting watch mode");

    let config = load_config(config_path, source, None)?;
    let source_dir = config.source.clone();
    let destination = config.destination.clone();

    let mut site = Site::new(config).wrap_err("Failed to set up the site")?;

    tracing::info!("Running initial build...");
    let stats = site.process().await.wrap_err("Build failed")?;
    print_build_stats(&stats, &destination);

    // Event paths are absolute; compare against absolute roots.
    let source_dir = source_dir.canonicalize().unwrap_or(source_dir);
    let ignored = destination.canonicalize().unwrap_or(destination);

    let (tx, mut rx) = mpsc::channel::<()>(16);
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event, &ignored) => {
                // A full channel already has a rebuild queued.
                let _ = tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Watch error: {e}"),
        },
        notify::Config::default(),
    )
    .wrap_err("Failed to create file watcher")?;

    watcher
        .watch(&source_dir, RecursiveMode::Recursive)
        .wrap_err("Failed to watch source directory")?;
    tracing::debug!(source = %source_dir.display(), "Watching source directory");

    println!("  Watching {} for changes", source_dir.display());
    println!("  Press Ctrl+C to stop");
    println!();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                println!();
                println!("  Stopping watch mode");
                break;
            }
            changed = rx.recv() => {
                if changed.is_none() {
                    break;
                }

                // Let the burst settle, then collapse it into one rebuild.
                tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)).await;
                while rx.try_recv().is_ok() {}

                println!();
                println!("  File change detected, rebuilding...");
                match site.process().await {
                    Ok(stats) => {
                        println!(
                            "  ✓ Rebuilt {} files in {}ms ({} removed)",
                            stats.files_written(),
                            stats.duration_ms,
                            stats.removed
                        );
                    }
                    Err(e) => {
                        tracing::error!("Rebuild failed: {e}");
                        eprintln!("  ✗ Rebuild failed: {e}");
                    }
                }
            }
        }
    }

    drop(watcher);
    Ok(())
}

/// Whether `event` should trigger a rebuild: a content change touching at least one
/// path outside the output tree.
fn is_relevant(event: &Event, destination: &Path) -> bool {
    let kind_matches = match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(kind)) => kind == MetadataKind::WriteTime,
        EventKind::Modify(_) => true,
        _ => false,
    };

    kind_matches && event.paths.iter().any(|p| !p.starts_with(destination))
}
