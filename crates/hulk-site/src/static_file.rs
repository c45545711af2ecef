//! Static assets: files copied to the output tree as they are.

use std::path::{Path, PathBuf};

use tokio::{fs::File, io::AsyncWriteExt};
use tracing::debug;

use crate::error::{BuildError, Result};

/// A file without front matter. Nothing is held in memory between phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFile {
    source_path: PathBuf,
    relative_path: PathBuf,
}

impl StaticFile {
    pub fn new(source_path: PathBuf, relative_path: PathBuf) -> Self {
        Self {
            source_path,
            relative_path,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Same relative path under `root`.
    pub fn destination_path(&self, root: &Path) -> PathBuf {
        root.join(&self.relative_path)
    }

    /// Stream the file to its destination.
    ///
    /// A failure part way leaves a partial file behind; the next successful build
    /// overwrites it.
    pub async fn write(&self, root: &Path) -> Result<PathBuf> {
        let dest = self.destination_path(root);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BuildError::io(parent, e))?;
        }

        let mut reader = File::open(&self.source_path)
            .await
            .map_err(|e| BuildError::io(&self.source_path, e))?;
        let mut writer = File::create(&dest)
            .await
            .map_err(|e| BuildError::io(&dest, e))?;

        let bytes = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|e| BuildError::io(&dest, e))?;
        writer.flush().await.map_err(|e| BuildError::io(&dest, e))?;

        debug!(path = %dest.display(), bytes, "copied static file");
        Ok(dest)
    }
}
