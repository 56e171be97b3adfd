//! The context-assembly pipeline.
//!
//! Builds the message list sent to a language model from conversation
//! history, the new user turn and retrieved knowledge, under a hard token
//! budget:
//!
//! 1. **Inject** (system role, history, knowledge, user input)
//! 2. **Truncate** by count and tokens, then by importance under a budget
//! 3. **Repair** tool-call/tool-response pairing
//!
//! Every stage implements [`Processor`]; a [`ContextPipeline`] runs them in
//! declaration order over a fresh [`ctxweave_core::PipelineContext`].

pub mod builder;
pub mod pipeline;
pub mod processor;
pub mod provider;
pub mod providers;
pub mod token;
pub mod tools;
pub mod truncation;

#[cfg(test)]
mod test_helpers;

pub use builder::build_pipeline;
pub use pipeline::{
    ContextPipeline, PipelineOptions, PipelineResult, PipelineStats, PipelineValidation,
    StageTiming,
};
pub use processor::{Processor, run_processor};
pub use provider::{InjectionPosition, Provider};
pub use providers::{HistoryInjector, KnowledgeInjector, SystemRoleInjector, UserInputInjector};
pub use token::HeuristicTokenCounter;
pub use tools::{ToolMessageReorder, ToolPairingReport, ToolReorderStats, validate_tool_pairing};
pub use truncation::{
    HistoryTruncationStats, HistoryTruncator, HistoryTruncatorConfig, ImportanceScorer,
    TokenBasedTruncator, TokenTruncationStats, TokenTruncatorConfig, TruncationMethod,
};
