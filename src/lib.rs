//! zipsift - pull matching files out of a ZIP archive and process them
//!
//! Each run extracts the entries with one extension into a private, hidden
//! workspace, hands every extracted file to a processor, then deletes the
//! workspace again.

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod processor;
pub mod walk;
pub mod workspace;

pub use config::{PipelineConfig, Settings};
pub use error::PipelineError;
pub use extract::{ExtractionOutcome, ExtractionReport, SelectiveExtractor};
pub use pipeline::{PipelineRunner, RunReport, Stage, StageFailure};
pub use processor::{FileProcessor, ReportingProcessor};
pub use walk::{TreeWalker, WalkOrder, WalkStats};
pub use workspace::{Workspace, WorkspaceManager};
