//! Per-run working directory

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Scratch directory every action of one run executes in
#[derive(Debug)]
pub struct RunWorkspace {
    path: PathBuf,
    keep: bool,
}

impl RunWorkspace {
    /// Create `<root>/<slug>-<run_id>`
    pub async fn create(
        root: &Path,
        slug: &str,
        run_id: Uuid,
        keep: bool,
    ) -> std::io::Result<Self> {
        let path = root.join(format!("{}-{}", slug, run_id));
        tokio::fs::create_dir_all(&path).await?;
        debug!("Created workspace {}", path.display());
        Ok(Self { path, keep })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory unless it should be kept. Failures are only logged.
    pub async fn finish(self) {
        if self.keep {
            debug!("Keeping workspace {}", self.path.display());
            return;
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            warn!("Failed to remove workspace {}: {}", self.path.display(), e);
        }
    }
}
