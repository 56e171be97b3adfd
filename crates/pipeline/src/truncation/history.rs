//! History truncation by message count and/or token ceiling.
//!
//! System messages are never dropped. The count limit is applied first;
//! the token limit then trims the count-limited result from the oldest
//! non-system message forward.

use async_trait::async_trait;
use ctxweave_core::{Message, PipelineContext, StageFailure, TokenCounter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::HISTORY_TRUNCATION_KEY;
use crate::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTruncatorConfig {
    /// Keep at most this many recent non-system messages
    pub keep_latest_n: Option<usize>,

    /// Token ceiling for the surviving set; requires a token counter
    pub max_tokens: Option<usize>,

    /// When the newest non-system message is a user turn, it does not count
    /// against `keep_latest_n`
    pub include_new_user_message: bool,
}

impl Default for HistoryTruncatorConfig {
    fn default() -> Self {
        Self {
            keep_latest_n: None,
            max_tokens: None,
            include_new_user_message: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationMethod {
    Count,
    Tokens,
}

/// Written under `historyTruncation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTruncationStats {
    pub original_count: usize,
    pub final_count: usize,
    pub removed_count: usize,
    /// Methods that actually removed something
    pub methods: Vec<TruncationMethod>,
}

pub struct HistoryTruncator {
    config: HistoryTruncatorConfig,
    token_counter: Option<Arc<dyn TokenCounter>>,
}

impl HistoryTruncator {
    pub fn new(config: HistoryTruncatorConfig) -> Self {
        Self {
            config,
            token_counter: None,
        }
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = Some(counter);
        self
    }

    pub fn config(&self) -> &HistoryTruncatorConfig {
        &self.config
    }

    /// Keep every system message plus the last `n` non-system messages.
    fn apply_count_limit(&self, messages: &[Message], n: usize) -> Vec<Message> {
        let newest_is_user = messages
            .iter()
            .rev()
            .find(|m| !m.is_system())
            .is_some_and(Message::is_user);

        let window = if n > 0 && self.config.include_new_user_message && newest_is_user {
            n + 1
        } else {
            n
        };

        let non_system = messages.iter().filter(|m| !m.is_system()).count();
        let skip = non_system.saturating_sub(window);

        let mut seen = 0;
        messages
            .iter()
            .filter(|m| {
                if m.is_system() {
                    return true;
                }
                seen += 1;
                seen > skip
            })
            .cloned()
            .collect()
    }

    /// Drop the oldest non-system message while the total exceeds `limit`.
    async fn apply_token_limit(
        &self,
        mut messages: Vec<Message>,
        limit: usize,
        counter: &dyn TokenCounter,
    ) -> Result<Vec<Message>, StageFailure> {
        let mut costs = Vec::with_capacity(messages.len());
        for message in &messages {
            costs.push(counter.count_message(message).await?);
        }
        let mut total: usize = costs.iter().sum();

        while total > limit {
            let Some(oldest) = messages.iter().position(|m| !m.is_system()) else {
                break;
            };
            total -= costs.remove(oldest);
            messages.remove(oldest);
        }

        debug!(limit, total, kept = messages.len(), "Token limit applied");
        Ok(messages)
    }
}

#[async_trait]
impl Processor for HistoryTruncator {
    fn name(&self) -> &str {
        "history_truncator"
    }

    fn validate_input(&self, _context: &PipelineContext) -> Result<(), StageFailure> {
        if self.config.max_tokens.is_some() && self.token_counter.is_none() {
            return Err(StageFailure::Config(
                "a token limit is configured but no token counter was provided".into(),
            ));
        }
        Ok(())
    }

    async fn transform(&self, context: &PipelineContext) -> Result<PipelineContext, StageFailure> {
        if context.messages.is_empty() {
            return Ok(context.clone());
        }

        let original_count = context.messages.len();
        let mut methods = Vec::new();

        let mut messages = match self.config.keep_latest_n {
            Some(n) => self.apply_count_limit(&context.messages, n),
            None => context.messages.clone(),
        };
        if messages.len() < original_count {
            methods.push(TruncationMethod::Count);
        }

        if let (Some(limit), Some(counter)) = (self.config.max_tokens, &self.token_counter) {
            let before = messages.len();
            messages = self.apply_token_limit(messages, limit, counter.as_ref()).await?;
            if messages.len() < before {
                methods.push(TruncationMethod::Tokens);
            }
        }

        let stats = HistoryTruncationStats {
            original_count,
            final_count: messages.len(),
            removed_count: original_count - messages.len(),
            methods,
        };

        if stats.removed_count > 0 {
            info!(
                original = stats.original_count,
                kept = stats.final_count,
                methods = ?stats.methods,
                "History truncated"
            );
        }

        let mut next = context.with_messages(messages);
        next.metadata.set_section(HISTORY_TRUNCATION_KEY, &stats)?;
        Ok(next)
    }
}
