//! Per-file processing hook
//!
//! The pipeline does not interpret extracted files itself; it hands each one to a
//! [`FileProcessor`]. Plain closures work too.

use std::path::Path;
use tracing::info;

/// Receives every regular file found under the workspace
pub trait FileProcessor: Send + Sync {
    fn process(&self, path: &Path);
}

impl<F> FileProcessor for F
where
    F: Fn(&Path) + Send + Sync,
{
    fn process(&self, path: &Path) {
        self(path)
    }
}

/// Logs each file it is given and does nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportingProcessor;

impl FileProcessor for ReportingProcessor {
    fn process(&self, path: &Path) {
        info!("Processed file: {}", path.display());
    }
}
