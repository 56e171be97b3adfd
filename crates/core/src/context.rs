//! The pipeline context threaded through every stage.
//!
//! A [`PipelineContext`] is created once per pipeline run and replaced (never
//! mutated in place) by each stage. The [`InitialState`] behind it is shared
//! through an `Arc` whose identity must survive every stage.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::message::Message;

/// Metadata key holding the model name.
pub const MODEL_KEY: &str = "model";
/// Metadata key holding the token budget.
pub const MAX_TOKENS_KEY: &str = "maxTokens";

/// A retrieved knowledge chunk (RAG snippet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    /// Human-readable source label (filename, URL, etc.)
    pub source: String,
    /// The text content of this chunk
    pub content: String,
    /// Similarity score from retrieval (0.0–1.0)
    #[serde(default)]
    pub similarity: f32,
}

/// Agent-level data carried in the initial state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// The agent's system role text; empty when the agent has none
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_role: String,

    /// Model preferred by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Source-of-truth conversation and agent/session data for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    /// Conversation history
    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default)]
    pub agent: AgentProfile,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// The new user turn, if not already part of `messages`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// Retrieved knowledge for this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge: Vec<KnowledgeChunk>,
}

impl InitialState {
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }
}

/// Open key-value bag for inter-stage signaling and diagnostics.
///
/// Stages write namespaced sections: one top-level key per stage, holding a
/// serialized stats struct owned by that stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, serde_json::Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.0.remove(key)
    }

    /// Write a stage's section.
    pub fn set_section<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        section: &T,
    ) -> Result<(), serde_json::Error> {
        self.0.insert(key.into(), serde_json::to_value(section)?);
        Ok(())
    }

    /// Read a stage's section back as its typed schema.
    ///
    /// `Ok(None)` when the key is absent; an error when the stored value
    /// does not match `T`.
    pub fn section<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, serde_json::Error> {
        self.0
            .get(key)
            .map(|value| T::deserialize(value))
            .transpose()
    }

    /// Copy all entries of `other` into this bag, overwriting existing keys.
    pub fn extend(&mut self, other: Metadata) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

/// Execution bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInfo {
    /// Names of stages that completed, in order
    pub executed_processors: Vec<String>,
    /// Stage failures, recorded by the orchestrator when a run stops
    pub errors: Vec<String>,
}

/// The unit threaded through every stage.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Immutable source of truth, shared by pointer
    pub initial_state: Arc<InitialState>,
    /// Working message sequence
    pub messages: Vec<Message>,
    pub metadata: Metadata,
    pub is_aborted: bool,
    pub abort_reason: Option<String>,
    pub execution_info: ExecutionInfo,
}

impl PipelineContext {
    /// Build the initial context for a run.
    pub fn new(
        initial_state: Arc<InitialState>,
        model: impl Into<String>,
        max_tokens: usize,
        extra: Metadata,
    ) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(MODEL_KEY, model.into());
        metadata.insert(MAX_TOKENS_KEY, max_tokens);
        metadata.extend(extra);
        Self {
            initial_state,
            messages: Vec::new(),
            metadata,
            is_aborted: false,
            abort_reason: None,
            execution_info: ExecutionInfo::default(),
        }
    }

    /// Clone this context with a new message sequence.
    pub fn with_messages(&self, messages: Vec<Message>) -> Self {
        Self {
            initial_state: Arc::clone(&self.initial_state),
            messages,
            metadata: self.metadata.clone(),
            is_aborted: self.is_aborted,
            abort_reason: self.abort_reason.clone(),
            execution_info: self.execution_info.clone(),
        }
    }

    /// Mark this context as aborted.
    pub fn abort(mut self, reason: impl Into<String>) -> Self {
        self.is_aborted = true;
        self.abort_reason = Some(reason.into());
        self
    }

    pub fn model(&self) -> Option<&str> {
        self.metadata.get(MODEL_KEY).and_then(|v| v.as_str())
    }

    pub fn max_tokens(&self) -> Option<usize> {
        self.metadata
            .get(MAX_TOKENS_KEY)
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
    }
}
