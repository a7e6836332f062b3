//! Pipeline error taxonomy
//!
//! Caller-input problems (`InvalidArgument`, `NotFound` on the archive) surface
//! synchronously. Everything that goes wrong once staged work has started is
//! recorded in the run report instead of being returned.

use std::io;
use std::path::PathBuf;

/// Errors produced by the extract/process/cleanup pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Workspace {action} failed for {}: {source}", path.display())]
    Resource {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Extraction of {} failed: {reason}", archive.display())]
    Extraction { archive: PathBuf, reason: String },

    #[error("{stage} task did not complete: {reason}")]
    TaskFailed { stage: &'static str, reason: String },
}

impl PipelineError {
    pub(crate) fn resource(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Resource {
            action,
            path: path.into(),
            source,
        }
    }

    /// True for the errors a caller can fix by passing different input
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidArgument(_) | PipelineError::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors() {
        assert!(PipelineError::InvalidArgument("archive path is empty").is_caller_error());
        assert!(PipelineError::NotFound(PathBuf::from("/nope.zip")).is_caller_error());

        let err = PipelineError::resource(
            "creation",
            "/tmp/x",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_caller_error());
        assert!(err.to_string().contains("creation"));
    }
}
