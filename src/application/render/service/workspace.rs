use std::{
    io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing::{debug, warn};

const WORKSPACE_PREFIX: &str = "letter-";

/// Per-request scratch directory, removed when dropped.
///
/// Directory names are unique within the root, so concurrent requests sharing
/// the same root never collide.
#[derive(Debug)]
pub(crate) struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    pub(crate) async fn create(root: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        debug!(
            target = "application::render::workspace",
            op = "workspace::create",
            path = %path.display(),
            "Workspace created"
        );
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => debug!(
                target = "application::render::workspace",
                op = "workspace::remove",
                path = %self.path.display(),
                "Workspace removed"
            ),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                target = "application::render::workspace",
                op = "workspace::remove",
                result = "error",
                path = %self.path.display(),
                error = %err,
                "Failed to remove workspace"
            ),
        }
    }
}
