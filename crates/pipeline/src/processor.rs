//! The processor contract: a uniform execution envelope around every stage.
//!
//! A stage implements [`Processor::transform`]; [`run_processor`] wraps it
//! with input validation, output validation, and execution bookkeeping.
//! Stages borrow the incoming context and return a new one, so the value a
//! stage was handed is never modified.

use async_trait::async_trait;
use ctxweave_core::{PipelineContext, ProcessorError, StageFailure};
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait Processor: Send + Sync {
    /// Stage name, used for bookkeeping, timing and error tagging.
    fn name(&self) -> &str;

    /// Stage-specific checks on the incoming context.
    fn validate_input(&self, _context: &PipelineContext) -> Result<(), StageFailure> {
        Ok(())
    }

    /// The stage's own transformation.
    async fn transform(&self, context: &PipelineContext) -> Result<PipelineContext, StageFailure>;

    /// Stage-specific checks on the outgoing context.
    fn validate_output(&self, _context: &PipelineContext) -> Result<(), StageFailure> {
        Ok(())
    }
}

fn tagged(processor: &dyn Processor, source: StageFailure) -> ProcessorError {
    ProcessorError::new(processor.name(), source)
}

/// Run one stage inside the execution envelope.
///
/// Any failure is tagged with the stage name and returned; the orchestrator
/// treats it as fatal for the run. On success the stage name is appended to
/// `execution_info.executed_processors`.
pub async fn run_processor(
    processor: &dyn Processor,
    context: &PipelineContext,
) -> Result<PipelineContext, ProcessorError> {
    processor
        .validate_input(context)
        .map_err(|e| tagged(processor, e))?;

    let mut output = processor
        .transform(context)
        .await
        .map_err(|e| tagged(processor, e))?;

    if !Arc::ptr_eq(&context.initial_state, &output.initial_state) {
        return Err(tagged(
            processor,
            StageFailure::InvalidOutput("stage replaced the initial state".into()),
        ));
    }

    processor
        .validate_output(&output)
        .map_err(|e| tagged(processor, e))?;

    output
        .execution_info
        .executed_processors
        .push(processor.name().to_string());

    debug!(
        processor = processor.name(),
        messages_in = context.messages.len(),
        messages_out = output.messages.len(),
        "Processor completed"
    );

    Ok(output)
}
