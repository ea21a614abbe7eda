//! Error types for the analysis pipeline.
//!
//! Chunk-level failures never show up here: they are absorbed into
//! the report as fallback text. These types cover the reasoning
//! service boundary, whole-pipeline failures and job lookups.

use crate::models::JobState;
use thiserror::Error;

/// Failure reported by a reasoning service.
///
/// The variant decides whether the client drops its session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The session could not be opened; the next attempt must open a new one.
    #[error("session creation failed: {0}")]
    SessionCreation(String),

    /// The session exists but the message could not be delivered or answered.
    #[error("message send failed: {0}")]
    Send(String),
}

/// Failure of the whole pipeline, outside chunk-level analysis.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The reasoning-service client could not be constructed.
    #[error("failed to initialize analysis client: {0}")]
    ClientInit(String),

    /// The segmenter could not be set up for the submission.
    #[error("segmentation failed: {0}")]
    Segmentation(#[from] SegmentationError),

    /// A chunk worker panicked or was aborted.
    #[error("chunk worker failed: {0}")]
    TaskJoin(String),
}

/// Segmenter setup failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SegmentationError {
    #[error("invalid chunk size: {0} (must be at least 1)")]
    InvalidChunkSize(usize),
}

/// Caller-facing job lookup errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {id} is not ready (state: {state})")]
    NotReady { id: String, state: JobState },
}
