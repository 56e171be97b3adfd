//! Shared test helpers for stage tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ctxweave_core::{
    InitialState, Message, Metadata, PipelineContext, TokenCountError, TokenCounter,
    ToolInvocation,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One token per character. Keeps budgets easy to reason about.
pub struct CharTokenCounter {
    calls: AtomicUsize,
}

impl CharTokenCounter {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenCounter for CharTokenCounter {
    async fn count(&self, text: &str) -> Result<usize, TokenCountError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(text.chars().count())
    }
}

/// A counter whose backend is always down.
pub struct FailingTokenCounter;

#[async_trait]
impl TokenCounter for FailingTokenCounter {
    async fn count(&self, _text: &str) -> Result<usize, TokenCountError> {
        Err(TokenCountError::Unavailable("tokenizer offline".into()))
    }
}

/// Fixed reference time for deterministic timestamps.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

/// `base_time() + seconds`.
pub fn ts(seconds: i64) -> Option<DateTime<Utc>> {
    Some(base_time() + Duration::seconds(seconds))
}

pub fn context_with(messages: Vec<Message>) -> PipelineContext {
    let ctx = PipelineContext::new(
        Arc::new(InitialState::default()),
        "test-model",
        4096,
        Metadata::new(),
    );
    ctx.with_messages(messages)
}

pub fn context_from_state(state: InitialState) -> PipelineContext {
    PipelineContext::new(Arc::new(state), "test-model", 4096, Metadata::new())
}

/// Message builders with stable ids and no timestamp.
pub mod msg {
    use super::*;

    pub fn system(id: &str, text: &str) -> Message {
        Message::system(text).with_id(id).with_created_at(None)
    }

    pub fn user(id: &str, text: &str) -> Message {
        Message::user(text).with_id(id).with_created_at(None)
    }

    pub fn assistant(id: &str, text: &str) -> Message {
        Message::assistant(text).with_id(id).with_created_at(None)
    }

    pub fn assistant_calls(id: &str, call_ids: &[&str]) -> Message {
        let calls = call_ids
            .iter()
            .map(|call_id| ToolInvocation::new(*call_id, "lookup", "{}"))
            .collect();
        Message::assistant_with_tool_calls("", calls)
            .with_id(id)
            .with_created_at(None)
    }

    pub fn tool(id: &str, call_id: &str, text: &str) -> Message {
        Message::tool_result(call_id, text)
            .with_id(id)
            .with_created_at(None)
    }
}

pub fn ids(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.id()).collect()
}
