//! Directory tree traversal
//!
//! Visits every regular file under a root, handing each to a [`FileProcessor`].
//! Within one directory all files are processed before any subdirectory is
//! entered. Pending directories live on an explicit work list, so deep trees do
//! not grow the call stack, and the order is a choice of [`WalkOrder`].
//! Entries of a directory are visited sorted by file name.
//!
//! Symlinked directories are not followed.

use crate::error::{PipelineError, Result};
use crate::processor::FileProcessor;

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Order in which pending subdirectories are taken off the work list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WalkOrder {
    /// Finish a subdirectory's whole subtree before its next sibling
    #[default]
    DepthFirst,
    /// Finish every directory at one depth before going deeper
    BreadthFirst,
}

/// Counts gathered during a walk
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    pub files: usize,
    pub directories: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TreeWalker {
    order: WalkOrder,
}

impl TreeWalker {
    pub fn new(order: WalkOrder) -> Self {
        Self { order }
    }

    /// Walk `root`, calling `processor` on every regular file
    ///
    /// Fails with `NotFound` if `root` is not a directory when the walk starts.
    pub fn walk(&self, root: &Path, processor: &dyn FileProcessor) -> Result<WalkStats> {
        if !root.is_dir() {
            return Err(PipelineError::NotFound(root.to_path_buf()));
        }

        let mut stats = WalkStats::default();
        let mut pending: VecDeque<PathBuf> = VecDeque::new();
        pending.push_back(root.to_path_buf());

        while let Some(dir) = self.next_dir(&mut pending) {
            let (files, subdirs) = list_dir(&dir)?;
            stats.directories += 1;
            debug!(
                "Walking {} ({} files, {} subdirectories)",
                dir.display(),
                files.len(),
                subdirs.len()
            );

            for file in &files {
                processor.process(file);
                stats.files += 1;
            }

            match self.order {
                // Pushed in reverse so the first subdirectory is popped first
                WalkOrder::DepthFirst => {
                    for sub in subdirs.into_iter().rev() {
                        pending.push_back(sub);
                    }
                }
                WalkOrder::BreadthFirst => pending.extend(subdirs),
            }
        }

        Ok(stats)
    }

    fn next_dir(&self, pending: &mut VecDeque<PathBuf>) -> Option<PathBuf> {
        match self.order {
            WalkOrder::DepthFirst => pending.pop_back(),
            WalkOrder::BreadthFirst => pending.pop_front(),
        }
    }
}

/// Split a directory's entries into regular files and subdirectories, sorted by name
fn list_dir(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::resource("listing", dir, e))?;

    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::resource("listing", dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| PipelineError::resource("listing", entry.path(), e))?;

        if file_type.is_file() {
            files.push(entry.path());
        } else if file_type.is_dir() {
            subdirs.push(entry.path());
        }
    }

    files.sort();
    subdirs.sort();
    Ok((files, subdirs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel.as_bytes()).unwrap();
    }

    fn collect(walker: TreeWalker, root: &Path) -> (Vec<String>, WalkStats) {
        let seen = Mutex::new(Vec::new());
        let processor = |path: &Path| {
            let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
            seen.lock().unwrap().push(rel);
        };
        let stats = walker.walk(root, &processor).unwrap();
        (seen.into_inner().unwrap(), stats)
    }

    #[test]
    fn test_visits_every_regular_file() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.csv");
        touch(dir.path(), "sub/b.csv");
        touch(dir.path(), "sub/c.txt");

        let (seen, stats) = collect(TreeWalker::default(), dir.path());
        assert_eq!(seen, vec!["a.csv", "sub/b.csv", "sub/c.txt"]);
        assert_eq!(stats, WalkStats { files: 3, directories: 2 });
    }

    #[test]
    fn test_files_before_subdirectories() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a/deep.csv");
        touch(dir.path(), "z.csv");

        let (seen, _) = collect(TreeWalker::default(), dir.path());
        assert_eq!(seen, vec!["z.csv", "a/deep.csv"]);
    }

    #[test]
    fn test_depth_first_vs_breadth_first() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a/x/1.csv");
        touch(dir.path(), "a/2.csv");
        touch(dir.path(), "b/3.csv");

        let (depth, _) = collect(TreeWalker::new(WalkOrder::DepthFirst), dir.path());
        assert_eq!(depth, vec!["a/2.csv", "a/x/1.csv", "b/3.csv"]);

        let (breadth, _) = collect(TreeWalker::new(WalkOrder::BreadthFirst), dir.path());
        assert_eq!(breadth, vec!["a/2.csv", "b/3.csv", "a/x/1.csv"]);
    }

    #[test]
    fn test_deep_tree() {
        let dir = tempdir().unwrap();
        let mut rel = String::new();
        for i in 0..200 {
            rel.push_str(&format!("d{}/", i % 10));
        }
        rel.push_str("leaf.csv");
        touch(dir.path(), &rel);

        let (seen, stats) = collect(TreeWalker::default(), dir.path());
        assert_eq!(seen.len(), 1);
        assert_eq!(stats.directories, 201);
    }

    #[test]
    fn test_empty_root() {
        let dir = tempdir().unwrap();
        let (seen, stats) = collect(TreeWalker::default(), dir.path());
        assert!(seen.is_empty());
        assert_eq!(stats, WalkStats { files: 0, directories: 1 });
    }

    #[test]
    fn test_missing_root() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");
        let err = TreeWalker::default()
            .walk(&missing, &|_: &Path| {})
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(p) if p == missing));
    }
}
