//! Error types for the ingestion/classification pipeline.
//!
//! Errors are classified by how the pipeline recovers from them:
//! - NotFound: recovered locally (skipped) in batch classification,
//!   surfaced to the caller for single-item calls
//! - RateLimitExceeded: transient-turned-fatal after the retry budget
//! - InvalidClassifierOutput: fatal, never retried — retrying will not fix
//!   a structural mismatch
//! - Db / Csv / Classifier: infrastructure failures, always fatal

use thiserror::Error;

use crate::db::DbError;

/// Errors surfaced by the resolver, orchestrator, and ingestion layers.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Meeting {0} not found")]
    NotFound(i64),

    #[error("Classifier rate limit still exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("Classifier returned invalid output: {0}")]
    InvalidClassifierOutput(String),

    #[error("Classifier call failed: {0}")]
    Classifier(String),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    /// True for errors a batch operation absorbs by skipping the item.
    pub fn is_skippable(&self) -> bool {
        matches!(self, PipelineError::NotFound(_))
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::Db(DbError::Sqlite(err))
    }
}
