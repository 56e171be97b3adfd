//! Injects the stored conversation history.

use async_trait::async_trait;
use ctxweave_core::{PipelineContext, StageFailure};

use crate::processor::Processor;
use crate::provider::Provider;

#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryInjector;

#[async_trait]
impl Processor for HistoryInjector {
    fn name(&self) -> &str {
        "history_injector"
    }

    async fn transform(&self, context: &PipelineContext) -> Result<PipelineContext, StageFailure> {
        if !self.should_inject(context) {
            return Ok(context.clone());
        }

        let history = &context.initial_state.messages;
        let mut messages = context.messages.clone();
        for message in history {
            self.insert_message(
                &mut messages,
                self.injection_position(context),
                message.clone(),
            );
        }

        let mut next = context.with_messages(messages);
        self.record_injection(&mut next.metadata, history.len());
        Ok(next)
    }
}

impl Provider for HistoryInjector {
    fn marker(&self) -> &str {
        "history"
    }

    fn should_inject(&self, context: &PipelineContext) -> bool {
        !context.initial_state.messages.is_empty() && !self.has_recorded(&context.metadata)
    }
}
