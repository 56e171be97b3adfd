//! # ctxweave Core
//!
//! Domain types, traits, and error definitions for the ctxweave
//! context-assembly pipeline. This crate has **zero framework dependencies**
//! (no async runtime, no I/O); it relies only on serde, serde_json, chrono,
//! uuid, thiserror and async-trait to define the model that the pipeline
//! stages transform.
//!
//! ## Design Philosophy
//!
//! - Messages are a tagged variant per role, so role-specific fields
//!   (tool invocations, back-references) only exist where they mean something.
//! - The pipeline context is replaced, never mutated in place: stages borrow
//!   the previous context and return a new one.
//! - Token counting is an injected capability ([`TokenCounter`]).

pub mod context;
pub mod error;
pub mod message;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use context::{
    AgentProfile, ExecutionInfo, InitialState, KnowledgeChunk, Metadata, PipelineContext,
};
pub use error::{PipelineError, ProcessorError, StageFailure, TokenCountError};
pub use message::{
    AssistantMessage, Attachment, AttachmentKind, Content, ContentPart, ImageUrl, Message,
    Reasoning, Role, SystemMessage, ToolInvocation, ToolMessage, UserMessage,
};
pub use token::TokenCounter;
