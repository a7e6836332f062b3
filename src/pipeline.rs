//! Extract → process → cleanup pipeline
//!
//! Stages of one run:
//! 1. Validate: archive path non-empty and pointing at a file
//! 2. Workspace: create the hidden scratch directory
//! 3. Extract: matching entries into the workspace (blocking worker)
//! 4. Process: walk the workspace, feeding every file to the processor
//! 5. Cleanup: delete the workspace
//!
//! Errors from steps 1 and 2 are returned to the caller. From step 3 on nothing
//! is returned as an error: failures are logged and collected in the
//! [`RunReport`]. Cleanup is attempted whatever happened in steps 3 and 4.

use crate::config::{ConfigError, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::extract::{validate_archive_path, ExtractionOutcome, SelectiveExtractor};
use crate::processor::{FileProcessor, ReportingProcessor};
use crate::walk::{TreeWalker, WalkStats};
use crate::workspace::{Workspace, WorkspaceManager};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

/// Pipeline stage that a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Process,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Process => "process",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure that was contained inside a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

/// Everything a run did after its workspace was created
#[derive(Debug)]
pub struct RunReport {
    pub archive: PathBuf,
    pub workspace: PathBuf,
    /// `None` if the extraction task itself did not complete
    pub extraction: Option<ExtractionOutcome>,
    /// `None` if the processing stage did not run to completion
    pub walk: Option<WalkStats>,
    pub cleaned_up: bool,
    pub failures: Vec<StageFailure>,
}

impl RunReport {
    fn new(archive: PathBuf, workspace: PathBuf) -> Self {
        Self {
            archive,
            workspace,
            extraction: None,
            walk: None,
            cleaned_up: false,
            failures: Vec::new(),
        }
    }

    /// True when every stage ran and nothing failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cleaned_up
    }

    pub fn files_extracted(&self) -> usize {
        self.extraction
            .as_ref()
            .map(|o| o.report().extracted.len())
            .unwrap_or(0)
    }

    pub fn files_processed(&self) -> usize {
        self.walk.map(|w| w.files).unwrap_or(0)
    }

    pub fn failed_stage(&self, stage: Stage) -> bool {
        self.failures.iter().any(|f| f.stage == stage)
    }

    fn record(&mut self, stage: Stage, error: impl fmt::Display) {
        warn!(
            "Something went wrong ({} stage, {}): {}",
            stage,
            self.archive.display(),
            error
        );
        self.failures.push(StageFailure {
            stage,
            message: error.to_string(),
        });
    }
}

fn task_failed(stage: Stage, e: JoinError) -> PipelineError {
    PipelineError::TaskFailed {
        stage: stage.as_str(),
        reason: e.to_string(),
    }
}

/// Runs archives through the pipeline
///
/// Cheap to clone; clones share the processor.
#[derive(Clone)]
pub struct PipelineRunner {
    workspaces: WorkspaceManager,
    extractor: SelectiveExtractor,
    walker: TreeWalker,
    processor: Arc<dyn FileProcessor>,
}

impl PipelineRunner {
    /// Create a runner that reports each processed file
    pub fn new(config: &PipelineConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            workspaces: WorkspaceManager::from_config(config),
            extractor: SelectiveExtractor::from_config(config),
            walker: TreeWalker::new(config.walk_order),
            processor: Arc::new(ReportingProcessor),
        })
    }

    /// Replace the per-file processor
    pub fn with_processor(self, processor: impl FileProcessor + 'static) -> Self {
        self.with_shared_processor(Arc::new(processor))
    }

    /// Replace the per-file processor with one the caller keeps a handle to
    pub fn with_shared_processor(mut self, processor: Arc<dyn FileProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Run the whole pipeline for one archive and wait for it to finish
    ///
    /// Only an invalid archive path or a workspace that cannot be created is
    /// returned as an error.
    pub async fn run(
        &self,
        archive_path: impl AsRef<Path>,
        password: Option<String>,
    ) -> Result<RunReport> {
        let (archive, workspace) = self.prepare(archive_path.as_ref())?;
        Ok(self.run_stages(archive, workspace, password).await)
    }

    /// Validate and create the workspace now, then run the remaining stages
    /// as a detached task on the current Tokio runtime
    pub fn spawn(
        &self,
        archive_path: impl AsRef<Path>,
        password: Option<String>,
    ) -> Result<JoinHandle<RunReport>> {
        let (archive, workspace) = self.prepare(archive_path.as_ref())?;
        let runner = self.clone();
        Ok(tokio::spawn(async move {
            runner.run_stages(archive, workspace, password).await
        }))
    }

    fn prepare(&self, archive_path: &Path) -> Result<(PathBuf, Workspace)> {
        validate_archive_path(archive_path)?;
        let workspace = self.workspaces.create()?;
        Ok((archive_path.to_path_buf(), workspace))
    }

    async fn run_stages(
        &self,
        archive: PathBuf,
        workspace: Workspace,
        password: Option<String>,
    ) -> RunReport {
        let mut report = RunReport::new(archive.clone(), workspace.path().to_path_buf());

        // Extract. The password moves into the task and is dropped with it.
        let extractor = self.extractor.clone();
        let destination = workspace.path().to_path_buf();
        let extraction = tokio::task::spawn_blocking(move || {
            extractor.extract(&archive, &destination, password.as_deref())
        })
        .await;

        let extraction_finished = match extraction {
            Ok(Ok(outcome)) => {
                if let ExtractionOutcome::Failed { error, .. } = &outcome {
                    report.record(Stage::Extract, error);
                }
                report.extraction = Some(outcome);
                true
            }
            Ok(Err(e)) => {
                // The archive disappeared after validation
                report.record(Stage::Extract, e);
                true
            }
            Err(e) => {
                report.record(Stage::Extract, task_failed(Stage::Extract, e));
                false
            }
        };

        if extraction_finished {
            match self.process(&workspace).await {
                Ok(stats) => {
                    info!(
                        "Processed {} file(s) in {} director(ies)",
                        stats.files, stats.directories
                    );
                    report.walk = Some(stats);
                }
                Err(e) => report.record(Stage::Process, e),
            }
        }

        let cleanup = tokio::task::spawn_blocking(move || workspace.destroy())
            .await
            .unwrap_or_else(|e| Err(task_failed(Stage::Cleanup, e)));
        match cleanup {
            Ok(()) => report.cleaned_up = true,
            Err(e) => report.record(Stage::Cleanup, e),
        }

        report
    }

    async fn process(&self, workspace: &Workspace) -> Result<WalkStats> {
        if !workspace.exists() {
            return Err(PipelineError::NotFound(workspace.path().to_path_buf()));
        }

        let walker = self.walker;
        let processor = Arc::clone(&self.processor);
        let root = workspace.path().to_path_buf();

        tokio::task::spawn_blocking(move || walker.walk(&root, processor.as_ref()))
            .await
            .unwrap_or_else(|e| Err(task_failed(Stage::Process, e)))
    }
}
