//! Scoped temporary directory owned by exactly one pipeline run.

use std::path::{Path, PathBuf};

use {tempfile::TempDir, tracing::warn};

use crate::error::{Context, Result};

const PREFIX: &str = "mediagrab-";

/// Fresh directory removed when dropped or explicitly closed.
#[derive(Debug)]
pub struct WorkDir {
    inner: Option<TempDir>,
    path: PathBuf,
}

impl WorkDir {
    /// Create a new directory under the system temp dir.
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir()
            .context("failed to create work directory")?;
        Ok(Self::from_tempdir(dir))
    }

    /// Create a new directory under `base`.
    pub fn create_in(base: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(base)
            .with_context(|| format!("failed to create work directory in {}", base.display()))?;
        Ok(Self::from_tempdir(dir))
    }

    fn from_tempdir(dir: TempDir) -> Self {
        let path = dir.path().to_path_buf();
        Self {
            inner: Some(dir),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory now, reporting failures instead of swallowing them.
    pub fn close(mut self) -> Result<()> {
        match self.inner.take() {
            Some(dir) => dir
                .close()
                .with_context(|| format!("failed to remove {}", self.path.display())),
            None => Ok(()),
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Some(dir) = self.inner.take()
            && let Err(e) = dir.close()
        {
            warn!(path = %self.path.display(), error = %e, "failed to remove work directory");
        }
    }
}
