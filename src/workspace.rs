//! Ephemeral workspace directories
//!
//! Each pipeline run gets one hidden directory under the temp root. The name
//! carries a random suffix so concurrent runs never share a workspace. Only this
//! module creates or removes workspace directories.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, Level};

/// Random characters appended to the workspace prefix
const RANDOM_SUFFIX_LEN: usize = 12;

/// Allocates workspaces under a fixed root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    prefix: String,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.temp_root, &config.workspace_prefix)
    }

    /// Create a fresh, hidden, uniquely named workspace directory
    pub fn create(&self) -> Result<Workspace> {
        let dir = tempfile::Builder::new()
            .prefix(&self.prefix)
            .rand_bytes(RANDOM_SUFFIX_LEN)
            .tempdir_in(&self.root)
            .map_err(|e| PipelineError::resource("creation", &self.root, e))?;

        mark_hidden(dir.path());

        info!("Directory created: {}", dir.path().display());

        Ok(Workspace { dir })
    }
}

/// A live workspace directory
///
/// Removed by [`Workspace::destroy`]. A handle dropped without being destroyed
/// (a stage panicked, the task was cancelled) still removes the directory, since
/// the underlying `TempDir` deletes itself on drop.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn exists(&self) -> bool {
        self.path().is_dir()
    }

    /// All regular files currently inside the workspace
    pub fn list_files(&self) -> Vec<PathBuf> {
        walkdir::WalkDir::new(self.path())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }

    /// Recursively delete the workspace and everything in it
    ///
    /// Fails if the directory is already gone.
    pub fn destroy(self) -> Result<()> {
        let path = self.path().to_path_buf();

        if tracing::enabled!(Level::DEBUG) {
            debug!("Removing {} files from {}", self.list_files().len(), path.display());
        }

        self.dir
            .close()
            .map_err(|e| PipelineError::resource("deletion", &path, e))?;

        info!("Directory deleted: {}", path.display());
        Ok(())
    }
}

/// Mark a directory hidden. On Unix the dot prefix already does this.
#[cfg(windows)]
fn mark_hidden(path: &Path) {
    let status = std::process::Command::new("attrib")
        .arg("+H")
        .arg(path)
        .status();
    match status {
        Ok(s) if s.success() => {}
        Ok(s) => tracing::warn!("attrib +H exited with {} for {}", s, path.display()),
        Err(e) => tracing::warn!("Could not hide {}: {}", path.display(), e),
    }
}

#[cfg(not(windows))]
fn mark_hidden(path: &Path) {
    let hidden = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false);
    if !hidden {
        debug!("Workspace name has no leading dot, not hidden: {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_is_hidden_and_unique() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path(), ".zipsift-");

        let a = manager.create().unwrap();
        let b = manager.create().unwrap();

        assert!(a.exists());
        assert!(b.exists());
        assert_ne!(a.path(), b.path());
        assert_eq!(a.path().parent(), Some(root.path()));

        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".zipsift-"));
        assert!(name.len() > ".zipsift-".len());

        a.destroy().unwrap();
        b.destroy().unwrap();
    }

    #[test]
    fn test_destroy_removes_contents() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path(), ".ws-");
        let ws = manager.create().unwrap();

        std::fs::create_dir_all(ws.path().join("a/b")).unwrap();
        std::fs::write(ws.path().join("a/b/c.csv"), b"1,2").unwrap();
        std::fs::write(ws.path().join("top.csv"), b"3,4").unwrap();
        assert_eq!(ws.list_files().len(), 2);

        let path = ws.path().to_path_buf();
        ws.destroy().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_destroy_with_debug_logging() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path(), ".ws-");
        let ws = manager.create().unwrap();
        std::fs::write(ws.path().join("a.csv"), b"a").unwrap();
        let path = ws.path().to_path_buf();

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || ws.destroy()).unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn test_destroy_missing_directory_fails() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path(), ".ws-");
        let ws = manager.create().unwrap();

        std::fs::remove_dir_all(ws.path()).unwrap();
        let err = ws.destroy().unwrap_err();
        assert!(matches!(err, PipelineError::Resource { action: "deletion", .. }));
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path(), ".ws-");
        let path = {
            let ws = manager.create().unwrap();
            std::fs::write(ws.path().join("x.csv"), b"x").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_create_in_missing_root_fails() {
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().join("missing"), ".ws-");
        let err = manager.create().unwrap_err();
        assert!(matches!(err, PipelineError::Resource { action: "creation", .. }));
    }
}
