//! Hulk Site Library
//!
//! The build orchestrator for hulk.
//!
//! # Modules
//!
//! - [`classify`] - Assigns every source file a role: ignored, layout, post, page or static
//! - [`unit`] - Layouts, posts and pages: parsing, rendering and writing
//! - [`static_file`] - Files copied to the output unchanged
//! - [`url`] - Permalinks and the URL to output path mapping
//! - [`site`] - The phased build and output reconciliation

pub mod classify;
pub mod error;
pub mod site;
pub mod static_file;
pub mod unit;
pub mod url;

pub use classify::{Classified, Classifier, PathClass, PostName};
pub use error::{BuildError, Result};
pub use site::{BuildState, BuildStats, CleanupFailure, CleanupReport, Site, SkippedFile};
pub use static_file::StaticFile;
pub use unit::{ContentUnit, Layouts, UnitKind};
