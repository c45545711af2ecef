//! Hulk Core Library
//!
//! Configuration, front matter parsing and error handling shared by the hulk
//! static site builder.

pub mod config;
pub mod error;
pub mod front_matter;

pub use config::Config;
pub use error::{CoreError, Result};
pub use front_matter::FrontMatter;
