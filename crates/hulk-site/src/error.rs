//! Build errors.

use std::path::{Path, PathBuf};

use hulk_convert::ConvertError;
use hulk_core::CoreError;
use thiserror::Error;

use crate::site::BuildState;

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(#[from] CoreError),

    /// IO error on a specific path.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A single file could not be turned into a content unit.
    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A converter failed while rendering a unit.
    #[error("render error in {path}: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: ConvertError,
    },

    /// A layout chain refers back to a layout already applied.
    #[error("layout cycle while rendering {path}: `{layout}` is already applied")]
    LayoutCycle { path: PathBuf, layout: String },

    /// A phase was invoked before the phase it depends on.
    #[error("cannot {operation} while the site is {state}")]
    OutOfOrder {
        operation: &'static str,
        state: BuildState,
    },

    /// A unit was written before it was rendered.
    #[error("{0} has not been rendered")]
    NotRendered(PathBuf),

    /// A blocking task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl BuildError {
    /// Attach a path to an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error for `path`.
    pub fn parse(path: &Path, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Whether the error only disqualifies a single file.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let err = BuildError::io(
            "/out/index.html",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/out/index.html"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_parse_errors_are_per_file() {
        let err = BuildError::parse(Path::new("about.md"), "front matter is not closed");
        assert!(err.is_parse());
        assert!(!BuildError::NotRendered(PathBuf::from("a.md")).is_parse());
    }

    #[test]
    fn test_out_of_order_message() {
        let err = BuildError::OutOfOrder {
            operation: "render",
            state: BuildState::Ready,
        };
        assert_eq!(err.to_string(), "cannot render while the site is ready");
    }
}
