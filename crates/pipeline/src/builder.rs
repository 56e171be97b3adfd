//! Builds a [`ContextPipeline`] from a [`PipelineConfig`].
//!
//! Stage order is fixed:
//!
//! 1. history → system role → knowledge → user input (injection)
//! 2. history truncator
//! 3. token truncator
//! 4. tool message reorder
//!
//! Disabled stages are left out.

use ctxweave_config::{ConfigError, PipelineConfig};
use ctxweave_core::TokenCounter;
use std::sync::Arc;
use tracing::debug;

use crate::pipeline::ContextPipeline;
use crate::processor::Processor;
use crate::providers::{HistoryInjector, KnowledgeInjector, SystemRoleInjector, UserInputInjector};
use crate::tools::ToolMessageReorder;
use crate::truncation::{
    HistoryTruncator, HistoryTruncatorConfig, TokenBasedTruncator, TokenTruncatorConfig,
};

pub fn build_pipeline(
    config: &PipelineConfig,
    counter: Arc<dyn TokenCounter>,
) -> Result<ContextPipeline, ConfigError> {
    config.validate()?;

    let mut stages: Vec<Arc<dyn Processor>> = Vec::new();
    let injection = &config.injection;

    if injection.history {
        stages.push(Arc::new(HistoryInjector));
    }
    if injection.system_role {
        stages.push(Arc::new(SystemRoleInjector));
    }
    if injection.knowledge {
        stages.push(Arc::new(KnowledgeInjector::new(
            injection.max_knowledge_chunks,
            injection.min_similarity,
        )));
    }
    if injection.user_input {
        let injector = match &injection.input_template {
            Some(template) => UserInputInjector::with_template(template.clone()),
            None => UserInputInjector::new(),
        };
        stages.push(Arc::new(injector));
    }

    let history = &config.history;
    if history.enabled && (history.keep_latest_n.is_some() || history.max_tokens.is_some()) {
        let truncator = HistoryTruncator::new(HistoryTruncatorConfig {
            keep_latest_n: history.keep_latest_n,
            max_tokens: history.max_tokens,
            include_new_user_message: history.include_new_user_message,
        })
        .with_token_counter(Arc::clone(&counter));
        stages.push(Arc::new(truncator));
    }

    let budget = &config.token_truncation;
    if budget.enabled {
        stages.push(Arc::new(TokenBasedTruncator::new(
            TokenTruncatorConfig {
                // None defers to the run's max_tokens
                max_tokens: budget.max_tokens,
                buffer_percentage: budget.buffer_percentage,
                preserve_system_messages: budget.preserve_system_messages,
                preserve_last_user_message: budget.preserve_last_user_message,
            },
            Arc::clone(&counter),
        )));
    }

    if config.tool_reorder.enabled {
        stages.push(Arc::new(ToolMessageReorder));
    }

    let pipeline = ContextPipeline::new(stages);
    debug!(
        stages = ?pipeline.processors().iter().map(|p| p.name()).collect::<Vec<_>>(),
        "Pipeline built from config"
    );
    Ok(pipeline)
}
