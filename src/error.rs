//! Failure reasons surfaced by the pipeline stages.

use std::path::PathBuf;
use thiserror::Error;

/// Why a pipeline stage stopped without producing its artifacts.
///
/// Row-level problems (a timestamp that does not parse, a node id missing
/// from the lookup table) never end up here: those rows are dropped or
/// filled in place.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input file '{}' not found", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to parse '{}': {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("no rows left after {0}")]
    EmptyResult(&'static str),

    #[error("remote fetch failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Spreadsheet(#[from] calamine::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// `true` when the stage ran fine but had nothing to emit.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, PipelineError::EmptyResult(_))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
