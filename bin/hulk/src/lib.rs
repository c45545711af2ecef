//! Hulk CLI Library
//!
//! Command implementations for the `hulk` binary, exposed as a library so they can
//! be driven from tests.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (build, watch, check, new)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! # async fn run() -> color_eyre::eyre::Result<()> {
//! hulk::cmd::build::run(Path::new("_config.yml"), None, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod cmd;

pub use hulk_core::Config;
pub use hulk_site::{BuildStats, Site};

/// Initialize tracing with the specified verbosity level.
///
/// # Arguments
///
/// * `verbose` - Verbosity level (0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE)
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
