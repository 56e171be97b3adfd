//! Provider specialization of the processor contract.
//!
//! Providers are stages that inject content. On top of [`Processor`] they
//! expose when to inject, where to inject, and helpers to merge text into
//! the system message or insert a new message. Each provider tags what it
//! injects with its own marker so a second pass can detect the first one.

use ctxweave_core::{Message, Metadata, PipelineContext};

use crate::processor::Processor;

/// Where a provider places a new message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPosition {
    Start,
    End,
    /// Clamped to the sequence length
    Index(usize),
}

pub trait Provider: Processor {
    /// Provider-specific marker used to detect prior injection.
    fn marker(&self) -> &str;

    /// Whether this provider should inject into `context`.
    fn should_inject(&self, context: &PipelineContext) -> bool {
        !context.messages.is_empty()
    }

    fn injection_position(&self, _context: &PipelineContext) -> InjectionPosition {
        InjectionPosition::End
    }

    /// Wrap `text` in this provider's marker block.
    fn wrap_marked(&self, text: &str) -> String {
        let marker = self.marker();
        format!("<{marker}>\n{text}\n</{marker}>")
    }

    /// Whether a system message already carries this provider's block.
    fn has_injected(&self, messages: &[Message]) -> bool {
        let open = format!("<{}>", self.marker());
        messages
            .iter()
            .any(|m| m.is_system() && m.text().contains(&open))
    }

    /// Insert `message` at `position`.
    fn insert_message(
        &self,
        messages: &mut Vec<Message>,
        position: InjectionPosition,
        message: Message,
    ) {
        let index = match position {
            InjectionPosition::Start => 0,
            InjectionPosition::End => messages.len(),
            InjectionPosition::Index(i) => i.min(messages.len()),
        };
        messages.insert(index, message);
    }

    /// Merge `text` into the first system message, or insert a new system
    /// message at the start when there is none. Returns `true` on merge.
    ///
    /// An inserted system message carries no timestamp, so a chronological
    /// re-sort keeps it ahead of timestamped history.
    fn merge_into_system(&self, messages: &mut Vec<Message>, text: &str, prepend: bool) -> bool {
        match messages.iter().position(Message::is_system) {
            Some(index) => {
                let existing = messages[index].text();
                let merged = if existing.is_empty() {
                    text.to_string()
                } else if prepend {
                    format!("{text}\n\n{existing}")
                } else {
                    format!("{existing}\n\n{text}")
                };
                let content = messages[index].content().with_text(merged);
                messages[index] = messages[index].with_content(content);
                true
            }
            None => {
                self.insert_message(
                    messages,
                    InjectionPosition::Start,
                    Message::system(text).with_created_at(None),
                );
                false
            }
        }
    }

    /// Metadata key this provider records its injection under.
    fn injection_key(&self) -> String {
        format!("injection.{}", self.marker())
    }

    /// Record how many items this provider injected.
    fn record_injection(&self, metadata: &mut Metadata, count: usize) {
        metadata.insert(self.injection_key(), count);
    }

    /// Whether an earlier pass of this provider recorded an injection.
    fn has_recorded(&self, metadata: &Metadata) -> bool {
        metadata.contains_key(&self.injection_key())
    }
}
