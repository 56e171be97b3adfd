//! Error types for the ctxweave domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The taxonomy follows
//! the execution envelope: a [`StageFailure`] is what went wrong inside a
//! stage, a [`ProcessorError`] tags it with the stage name, and a
//! [`PipelineError`] is what the orchestrator hands back to the caller.

use thiserror::Error;

use crate::context::ExecutionInfo;

/// Failure raised by a [`crate::TokenCounter`].
#[derive(Debug, Clone, Error)]
pub enum TokenCountError {
    #[error("Token counter unavailable: {0}")]
    Unavailable(String),

    #[error("Token counting failed: {0}")]
    Failed(String),
}

/// The cause of a stage failure.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("Invalid input context: {0}")]
    InvalidInput(String),

    #[error("Invalid output context: {0}")]
    InvalidOutput(String),

    #[error(transparent)]
    TokenCount(#[from] TokenCountError),

    #[error("Stage misconfigured: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// A stage failure tagged with the name of the stage that raised it.
#[derive(Debug, Error)]
#[error("Processor '{processor}' failed: {message}")]
pub struct ProcessorError {
    /// Name of the failing stage
    pub processor: String,

    /// Human-readable summary
    pub message: String,

    /// The original cause
    #[source]
    pub source: StageFailure,
}

impl ProcessorError {
    pub fn new(processor: impl Into<String>, source: StageFailure) -> Self {
        Self {
            processor: processor.into(),
            message: source.to_string(),
            source,
        }
    }
}

/// Errors surfaced by the pipeline orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline failed at stage '{stage}': {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: ProcessorError,
        /// Bookkeeping up to and including the failure
        execution: ExecutionInfo,
    },
}

impl PipelineError {
    /// Name of the failing stage.
    pub fn stage(&self) -> &str {
        match self {
            Self::StageFailed { stage, .. } => stage,
        }
    }

    /// Stages that completed before the failure, plus the recorded error.
    pub fn execution_info(&self) -> &ExecutionInfo {
        match self {
            Self::StageFailed { execution, .. } => execution,
        }
    }
}
