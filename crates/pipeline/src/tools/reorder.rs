//! Reordering of tool responses behind their declaring assistant turn.
//!
//! Single pass over the input:
//!
//! - a tool response whose back-reference is missing or declared by no
//!   assistant turn is dropped
//! - of several responses to one invocation, the first wins
//! - right after each assistant turn, its responses are emitted in the
//!   order the invocations were declared
//!
//! A response that appears before its assistant turn is moved after it.

use async_trait::async_trait;
use ctxweave_core::{Message, PipelineContext, StageFailure};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::processor::Processor;

/// Metadata key written by [`ToolMessageReorder`].
pub const TOOL_REORDER_KEY: &str = "toolReorder";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolReorderStats {
    pub original_count: usize,
    pub final_count: usize,
    /// Orphaned, unreferenced and duplicate tool responses
    pub removed_invalid_tools: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ToolMessageReorder;

impl ToolMessageReorder {
    pub fn new() -> Self {
        Self
    }

    /// Rebuild `messages` with every tool response directly after its
    /// assistant turn. Returns the new sequence and the number dropped.
    pub fn reorder(messages: &[Message]) -> (Vec<Message>, usize) {
        let declared: HashSet<&str> = messages
            .iter()
            .flat_map(Message::tool_calls)
            .filter_map(|call| call.valid_id())
            .collect();

        // First response per declared invocation id
        let mut first_response: HashMap<&str, usize> = HashMap::new();
        for (index, message) in messages.iter().enumerate() {
            if let Some(id) = message.tool_call_id()
                && declared.contains(id)
            {
                first_response.entry(id).or_insert(index);
            }
        }

        let mut output = Vec::with_capacity(messages.len());
        let mut placed: HashSet<&str> = HashSet::new();
        let mut removed = 0;

        for (index, message) in messages.iter().enumerate() {
            if let Message::Tool(_) = message {
                match message.tool_call_id() {
                    Some(id) if first_response.get(id) == Some(&index) => {
                        // Emitted behind its assistant turn
                    }
                    Some(id) if declared.contains(id) => {
                        debug!(id = message.id(), call_id = id, "Dropping duplicate tool response");
                        removed += 1;
                    }
                    call_id => {
                        warn!(
                            id = message.id(),
                            call_id = call_id.unwrap_or(""),
                            "Dropping tool response with no matching tool call"
                        );
                        removed += 1;
                    }
                }
                continue;
            }

            output.push(message.clone());

            for call in message.tool_calls() {
                let Some(id) = call.valid_id() else {
                    continue;
                };
                if placed.contains(id) {
                    continue;
                }
                if let Some(&response) = first_response.get(id) {
                    output.push(messages[response].clone());
                    placed.insert(id);
                }
            }
        }

        (output, removed)
    }
}

#[async_trait]
impl Processor for ToolMessageReorder {
    fn name(&self) -> &str {
        "tool_message_reorder"
    }

    async fn transform(&self, context: &PipelineContext) -> Result<PipelineContext, StageFailure> {
        if context.messages.is_empty() {
            return Ok(context.clone());
        }

        let (messages, removed) = Self::reorder(&context.messages);
        let stats = ToolReorderStats {
            original_count: context.messages.len(),
            final_count: messages.len(),
            removed_invalid_tools: removed,
        };

        let mut next = context.with_messages(messages);
        next.metadata.set_section(TOOL_REORDER_KEY, &stats)?;
        Ok(next)
    }
}
