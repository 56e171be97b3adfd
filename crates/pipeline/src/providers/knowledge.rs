//! Injects retrieved knowledge (RAG) into the system message.
//!
//! Chunks are ranked by similarity, highest first, and rendered one per
//! line as `[Source: <source>] <content>` inside a `<knowledge>` block.

use async_trait::async_trait;
use ctxweave_core::{KnowledgeChunk, PipelineContext, StageFailure};

use crate::processor::Processor;
use crate::provider::Provider;

#[derive(Debug, Clone, Default)]
pub struct KnowledgeInjector {
    /// Inject at most this many chunks (None = all)
    pub max_chunks: Option<usize>,
    /// Skip chunks scoring below this
    pub min_similarity: f32,
}

impl KnowledgeInjector {
    pub fn new(max_chunks: Option<usize>, min_similarity: f32) -> Self {
        Self {
            max_chunks,
            min_similarity,
        }
    }

    fn select<'a>(&self, chunks: &'a [KnowledgeChunk]) -> Vec<&'a KnowledgeChunk> {
        let mut selected: Vec<&KnowledgeChunk> = chunks
            .iter()
            .filter(|c| c.similarity >= self.min_similarity)
            .collect();
        selected.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        if let Some(max) = self.max_chunks {
            selected.truncate(max);
        }
        selected
    }

    fn render(chunks: &[&KnowledgeChunk]) -> String {
        chunks
            .iter()
            .map(|c| format!("[Source: {}] {}", c.source, c.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Processor for KnowledgeInjector {
    fn name(&self) -> &str {
        "knowledge_injector"
    }

    async fn transform(&self, context: &PipelineContext) -> Result<PipelineContext, StageFailure> {
        if !self.should_inject(context) {
            return Ok(context.clone());
        }

        let selected = self.select(&context.initial_state.knowledge);
        if selected.is_empty() {
            return Ok(context.clone());
        }

        let block = self.wrap_marked(&Self::render(&selected));
        let mut messages = context.messages.clone();
        self.merge_into_system(&mut messages, &block, false);

        let mut next = context.with_messages(messages);
        self.record_injection(&mut next.metadata, selected.len());
        Ok(next)
    }
}

impl Provider for KnowledgeInjector {
    fn marker(&self) -> &str {
        "knowledge"
    }

    fn should_inject(&self, context: &PipelineContext) -> bool {
        !context.initial_state.knowledge.is_empty() && !self.has_injected(&context.messages)
    }
}
