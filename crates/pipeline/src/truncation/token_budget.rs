//! Importance-ranked truncation under a buffered token budget.
//!
//! System messages and the latest user turn form a hard-kept set that is
//! never dropped. The remaining messages compete for the residual budget in
//! descending [`ImportanceScorer`] order; the first one that does not fit
//! may be cut down to a prefix, after which selection stops. The survivors
//! are returned in chronological order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ctxweave_core::{Message, PipelineContext, StageFailure, TokenCounter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::TOKEN_TRUNCATION_KEY;
use super::importance::ImportanceScorer;
use crate::processor::Processor;

/// Partial truncation is only attempted with at least this much room left.
const MIN_PARTIAL_BUDGET: usize = 50;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq)]
pub struct TokenTruncatorConfig {
    /// Token ceiling; falls back to the run's `maxTokens` metadata
    pub max_tokens: Option<usize>,

    /// Fraction of the ceiling held back as a safety margin (0.0–1.0)
    pub buffer_percentage: f64,

    pub preserve_system_messages: bool,
    pub preserve_last_user_message: bool,
}

impl Default for TokenTruncatorConfig {
    fn default() -> Self {
        Self {
            max_tokens: None,
            buffer_percentage: 0.1,
            preserve_system_messages: true,
            preserve_last_user_message: true,
        }
    }
}

/// Written under `tokenTruncation`, only when something was removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTruncationStats {
    pub original_tokens: usize,
    pub final_tokens: usize,
    pub tokens_saved: usize,
    pub original_count: usize,
    pub final_count: usize,
    /// `max_tokens * (1 - buffer_percentage)`
    pub effective_limit: usize,
    pub buffer_percentage: f64,
    pub max_tokens: usize,
    /// Message cut down to a prefix, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated_message_id: Option<String>,
}

pub struct TokenBasedTruncator {
    config: TokenTruncatorConfig,
    counter: Arc<dyn TokenCounter>,
    scorer: ImportanceScorer,
}

/// The buffered limit every comparison is made against.
pub fn effective_limit(max_tokens: usize, buffer_percentage: f64) -> usize {
    // Tolerate float noise such as 100 * 0.7 = 69.99999...
    (max_tokens as f64 * (1.0 - buffer_percentage) + 1e-9).floor() as usize
}

impl TokenBasedTruncator {
    pub fn new(config: TokenTruncatorConfig, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            config,
            counter,
            scorer: ImportanceScorer,
        }
    }

    pub fn config(&self) -> &TokenTruncatorConfig {
        &self.config
    }

    fn max_tokens_for(&self, context: &PipelineContext) -> Option<usize> {
        self.config.max_tokens.or_else(|| context.max_tokens())
    }

    /// Select the messages to keep. `None` stats means the input already fit.
    async fn truncate(
        &self,
        messages: &[Message],
        max_tokens: usize,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Message>, Option<TokenTruncationStats>), StageFailure> {
        let limit = effective_limit(max_tokens, self.config.buffer_percentage);
        if messages.is_empty() {
            return Ok((Vec::new(), None));
        }

        let original_tokens = self.counter.count_messages(messages).await?;
        if original_tokens <= limit {
            return Ok((messages.to_vec(), None));
        }

        let last_user = if self.config.preserve_last_user_message {
            messages.iter().rposition(Message::is_user)
        } else {
            None
        };
        let is_hard_kept = |index: usize, message: &Message| {
            (self.config.preserve_system_messages && message.is_system())
                || Some(index) == last_user
        };

        let mut hard_kept: Vec<Message> = messages
            .iter()
            .enumerate()
            .filter(|(i, m)| is_hard_kept(*i, *m))
            .map(|(_, m)| m.clone())
            .collect();
        let hard_cost = self.counter.count_messages(&hard_kept).await?;

        let mut truncated_message_id = None;
        let kept = if hard_cost > limit {
            warn!(
                hard_cost,
                limit, "Preserved messages alone exceed the token budget"
            );
            sort_chronologically(&mut hard_kept);
            hard_kept
        } else {
            let mut remaining = limit - hard_cost;
            let mut selected: Vec<(usize, Message)> = messages
                .iter()
                .enumerate()
                .filter(|(i, m)| is_hard_kept(*i, *m))
                .map(|(i, m)| (i, m.clone()))
                .collect();

            let mut candidates: Vec<(usize, f64)> = messages
                .iter()
                .enumerate()
                .filter(|(i, m)| !is_hard_kept(*i, *m))
                .map(|(i, m)| (i, self.scorer.score(m, now)))
                .collect();
            // Stable: equal scores keep their original relative order.
            candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

            for (index, score) in candidates {
                let message = &messages[index];
                let cost = self.counter.count_message(message).await?;
                if cost <= remaining {
                    remaining -= cost;
                    selected.push((index, message.clone()));
                    continue;
                }

                debug!(id = message.id(), cost, remaining, score, "Candidate does not fit");
                if remaining >= MIN_PARTIAL_BUDGET
                    && let Some(partial) = self.truncate_message(message, remaining).await?
                {
                    truncated_message_id = Some(message.id().to_string());
                    selected.push((index, partial));
                }
                break;
            }

            selected.sort_by_key(|(index, _)| *index);
            let mut selected: Vec<Message> = selected.into_iter().map(|(_, m)| m).collect();
            sort_chronologically(&mut selected);
            selected
        };

        let final_tokens = self.counter.count_messages(&kept).await?;
        let stats = TokenTruncationStats {
            original_tokens,
            final_tokens,
            tokens_saved: original_tokens.saturating_sub(final_tokens),
            original_count: messages.len(),
            final_count: kept.len(),
            effective_limit: limit,
            buffer_percentage: self.config.buffer_percentage,
            max_tokens,
            truncated_message_id,
        };
        Ok((kept, Some(stats)))
    }

    /// Longest character prefix of `message`'s text that, with a trailing
    /// ellipsis, costs at most `budget`. Binary search: at most
    /// ⌈log2(chars)⌉ + 1 counter calls.
    async fn truncate_message(
        &self,
        message: &Message,
        budget: usize,
    ) -> Result<Option<Message>, StageFailure> {
        let text = message.text();
        let bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        if bounds.len() < 2 {
            return Ok(None);
        }

        // Window over prefix lengths [lo, hi]; shrinks every iteration.
        let (mut lo, mut hi) = (1, bounds.len() - 1);
        let mut best = 0;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let candidate = format!("{}{ELLIPSIS}", &text[..bounds[mid]]);
            if self.counter.count(&candidate).await? <= budget {
                best = mid;
                lo = mid + 1;
            } else {
                hi = mid - 1;
            }
        }

        if best == 0 {
            return Ok(None);
        }
        let truncated = format!("{}{ELLIPSIS}", &text[..bounds[best]]);
        Ok(Some(
            message.with_content(message.content().with_text(truncated)),
        ))
    }
}

/// Stable ascending sort by `created_at`; a missing timestamp sorts as epoch 0.
fn sort_chronologically(messages: &mut [Message]) {
    messages.sort_by_key(|m| m.created_at().map_or(0, |t| t.timestamp_millis()));
}

#[async_trait]
impl Processor for TokenBasedTruncator {
    fn name(&self) -> &str {
        "token_truncator"
    }

    fn validate_input(&self, context: &PipelineContext) -> Result<(), StageFailure> {
        let buffer = self.config.buffer_percentage;
        if !(0.0..1.0).contains(&buffer) {
            return Err(StageFailure::Config(format!(
                "buffer_percentage must be in [0, 1), got {buffer}"
            )));
        }
        if self.max_tokens_for(context).is_none() {
            return Err(StageFailure::Config(
                "no token limit configured and none in the run metadata".into(),
            ));
        }
        Ok(())
    }

    async fn transform(&self, context: &PipelineContext) -> Result<PipelineContext, StageFailure> {
        let Some(max_tokens) = self.max_tokens_for(context) else {
            return Err(StageFailure::Config("no token limit available".into()));
        };

        let (messages, stats) = self
            .truncate(&context.messages, max_tokens, Utc::now())
            .await?;
        let Some(stats) = stats else {
            return Ok(context.clone());
        };

        info!(
            original_tokens = stats.original_tokens,
            final_tokens = stats.final_tokens,
            limit = stats.effective_limit,
            kept = stats.final_count,
            of = stats.original_count,
            "Token budget enforced"
        );

        let mut next = context.with_messages(messages);
        next.metadata.set_section(TOKEN_TRUNCATION_KEY, &stats)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        CharTokenCounter, FailingTokenCounter, base_time, context_with, ids, msg, ts,
    };
    use ctxweave_core::ToolInvocation;

    fn truncator(max_tokens: usize, counter: Arc<CharTokenCounter>) -> TokenBasedTruncator {
        TokenBasedTruncator::new(
            TokenTruncatorConfig {
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
            counter,
        )
    }

    fn long_conversation() -> Vec<Message> {
        vec![
            msg::system("s", "SSSSS"),
            msg::user("a", &"A".repeat(5000)),
            msg::assistant("b", "Sure, noted."),
            msg::user("final", "Final"),
        ]
    }

    #[test]
    fn buffered_limit() {
        assert_eq!(effective_limit(200, 0.1), 180);
        assert_eq!(effective_limit(100, 0.3), 70);
        assert_eq!(effective_limit(1000, 0.0), 1000);
    }

    #[tokio::test]
    async fn within_budget_is_a_no_op() {
        let ctx = context_with(long_conversation());
        let counter = Arc::new(CharTokenCounter::new());
        let out = truncator(10_000, counter).transform(&ctx).await.unwrap();

        assert_eq!(out.messages, ctx.messages);
        assert!(!out.metadata.contains_key(TOKEN_TRUNCATION_KEY));
    }

    #[tokio::test]
    async fn oversized_message_is_cut_to_a_prefix() {
        let ctx = context_with(long_conversation());
        let counter = Arc::new(CharTokenCounter::new());
        let out = truncator(200, counter.clone()).transform(&ctx).await.unwrap();

        // limit 180, hard-kept "SSSSS" + "Final" = 10, residual 170
        assert_eq!(ids(&out.messages), vec!["s", "a", "final"]);
        assert_eq!(out.messages[0].text(), "SSSSS");
        assert_eq!(out.messages[2].text(), "Final");

        let cut = out.messages[1].text();
        assert!(cut.ends_with("..."));
        assert_eq!(cut.len(), 170);

        let stats: TokenTruncationStats = out
            .metadata
            .section(TOKEN_TRUNCATION_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(stats.effective_limit, 180);
        assert_eq!(stats.final_tokens, 180);
        assert_eq!(stats.original_count, 4);
        assert_eq!(stats.final_count, 3);
        assert_eq!(stats.truncated_message_id.as_deref(), Some("a"));
        assert_eq!(stats.tokens_saved, 5022 - 180);

        // 3 batch counts + 1 candidate + bounded binary search
        assert!(counter.calls() <= 4 + 14, "calls = {}", counter.calls());
    }

    #[tokio::test]
    async fn small_residual_stops_selection() {
        let ctx = context_with(long_conversation());
        let counter = Arc::new(CharTokenCounter::new());
        // limit 36, residual 26: "a" does not fit and 26 < 50, so "b" is never tried
        let out = truncator(40, counter).transform(&ctx).await.unwrap();

        assert_eq!(ids(&out.messages), vec!["s", "final"]);
    }

    #[tokio::test]
    async fn hard_kept_set_over_budget_is_returned_as_is() {
        let messages = vec![
            msg::system("s", &"S".repeat(300)),
            msg::assistant("b", "short"),
            msg::user("u", "question"),
        ];
        let ctx = context_with(messages);
        let out = truncator(100, Arc::new(CharTokenCounter::new()))
            .transform(&ctx)
            .await
            .unwrap();

        assert_eq!(ids(&out.messages), vec!["s", "u"]);
        let stats: TokenTruncationStats = out
            .metadata
            .section(TOKEN_TRUNCATION_KEY)
            .unwrap()
            .unwrap();
        assert!(stats.final_tokens > stats.effective_limit);
    }

    #[tokio::test]
    async fn hard_kept_set_over_budget_is_sorted_by_timestamp() {
        let messages = vec![
            msg::system("s", &"S".repeat(300)).with_created_at(ts(120)),
            msg::assistant("b", "short").with_created_at(ts(30)),
            msg::user("u", "question").with_created_at(ts(60)),
        ];
        let ctx = context_with(messages);
        let out = truncator(100, Arc::new(CharTokenCounter::new()))
            .transform(&ctx)
            .await
            .unwrap();

        assert_eq!(ids(&out.messages), vec!["u", "s"]);
        assert!(
            out.messages
                .windows(2)
                .all(|pair| pair[0].created_at() <= pair[1].created_at())
        );
    }

    #[tokio::test]
    async fn higher_importance_wins_the_budget() {
        let messages = vec![
            msg::system("s", "sys"),
            msg::tool("t", "call_1", &"t".repeat(15)),
            msg::assistant("a", &"a".repeat(15)),
            msg::user("u", "now"),
        ];
        let ctx = context_with(messages);
        // limit 22, hard 6, residual 16: only one of the two fits and the
        // assistant (7) outranks the earlier tool result (5)
        let out = truncator(25, Arc::new(CharTokenCounter::new()))
            .transform(&ctx)
            .await
            .unwrap();

        assert_eq!(ids(&out.messages), vec!["s", "a", "u"]);
    }

    #[tokio::test]
    async fn output_is_chronological() {
        let untimed = Message::assistant_with_tool_calls(
            "w".repeat(60),
            vec![ToolInvocation::new("call_9", "lookup", "{}")],
        )
        .with_id("a2")
        .with_created_at(None);

        let messages = vec![
            msg::system("s", "sys").with_created_at(ts(-4000)),
            msg::user("u1", &"x".repeat(60)).with_created_at(ts(-3500)),
            msg::assistant("a1", &"y".repeat(60)).with_created_at(ts(-3000)),
            msg::user("u2", &"z".repeat(60)).with_created_at(ts(-30)),
            untimed,
            msg::user("u3", "latest").with_created_at(ts(0)),
        ];
        let stage = TokenBasedTruncator::new(
            TokenTruncatorConfig {
                max_tokens: Some(150),
                buffer_percentage: 0.0,
                ..Default::default()
            },
            Arc::new(CharTokenCounter::new()),
        );

        // residual 141: u2 (~16) then a2 (12) fit, u1 (~11) does not
        let (kept, stats) = stage.truncate(&messages, 150, base_time()).await.unwrap();

        assert!(stats.is_some());
        assert_eq!(ids(&kept), vec!["a2", "s", "u2", "u3"]);
        let stamps: Vec<i64> = kept
            .iter()
            .map(|m| m.created_at().map_or(0, |t| t.timestamp_millis()))
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn budget_is_respected_across_limits() {
        for max_tokens in [20, 60, 120, 400, 1200, 3000] {
            let ctx = context_with(long_conversation());
            let out = truncator(max_tokens, Arc::new(CharTokenCounter::new()))
                .transform(&ctx)
                .await
                .unwrap();

            let total: usize = out.messages.iter().map(|m| m.text().chars().count()).sum();
            assert!(
                total <= effective_limit(max_tokens, 0.1),
                "max_tokens = {max_tokens}, total = {total}"
            );
            assert!(out.messages.iter().all(|m| m.text().len() < 5000));
        }
    }

    #[tokio::test]
    async fn falls_back_to_run_max_tokens() {
        // context_with sets maxTokens = 4096
        let ctx = context_with(vec![msg::user("u", &"x".repeat(5000))]);
        let stage = TokenBasedTruncator::new(
            TokenTruncatorConfig::default(),
            Arc::new(CharTokenCounter::new()),
        );
        stage.validate_input(&ctx).unwrap();
        let out = stage.transform(&ctx).await.unwrap();

        let stats: TokenTruncationStats = out
            .metadata
            .section(TOKEN_TRUNCATION_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(stats.max_tokens, 4096);
        assert!(stats.final_tokens > stats.effective_limit);
    }

    #[tokio::test]
    async fn counter_failure_is_fatal() {
        let stage = TokenBasedTruncator::new(
            TokenTruncatorConfig::default(),
            Arc::new(FailingTokenCounter),
        );
        let err = stage
            .transform(&context_with(long_conversation()))
            .await
            .unwrap_err();
        assert!(matches!(err, StageFailure::TokenCount(_)));
    }

    #[test]
    fn invalid_buffer_is_rejected() {
        let stage = TokenBasedTruncator::new(
            TokenTruncatorConfig {
                max_tokens: Some(100),
                buffer_percentage: 1.0,
                ..Default::default()
            },
            Arc::new(CharTokenCounter::new()),
        );
        assert!(matches!(
            stage.validate_input(&context_with(vec![])),
            Err(StageFailure::Config(_))
        ));
    }
}
