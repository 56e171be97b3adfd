//! Appends the new user turn, optionally rendered through a template.

use async_trait::async_trait;
use ctxweave_core::{Message, PipelineContext, StageFailure};

use crate::processor::Processor;
use crate::provider::Provider;

/// Placeholder replaced by the raw input in a template.
pub const INPUT_PLACEHOLDER: &str = "{{input}}";

#[derive(Debug, Clone, Default)]
pub struct UserInputInjector {
    template: Option<String>,
}

impl UserInputInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
        }
    }

    fn render(&self, input: &str) -> String {
        match &self.template {
            Some(template) => template.replace(INPUT_PLACEHOLDER, input),
            None => input.to_string(),
        }
    }
}

#[async_trait]
impl Processor for UserInputInjector {
    fn name(&self) -> &str {
        "user_input_injector"
    }

    async fn transform(&self, context: &PipelineContext) -> Result<PipelineContext, StageFailure> {
        if !self.should_inject(context) {
            return Ok(context.clone());
        }
        let Some(input) = context.initial_state.input.as_deref() else {
            return Ok(context.clone());
        };

        let text = self.render(input);

        // History may already end with this exact turn
        let already_present = context
            .messages
            .iter()
            .rev()
            .find(|m| !m.is_system())
            .is_some_and(|m| m.is_user() && m.text() == text);
        if already_present {
            return Ok(context.clone());
        }

        let mut messages = context.messages.clone();
        self.insert_message(
            &mut messages,
            self.injection_position(context),
            Message::user(text),
        );

        let mut next = context.with_messages(messages);
        self.record_injection(&mut next.metadata, 1);
        Ok(next)
    }
}

impl Provider for UserInputInjector {
    fn marker(&self) -> &str {
        "user_input"
    }

    fn should_inject(&self, context: &PipelineContext) -> bool {
        context
            .initial_state
            .input
            .as_deref()
            .is_some_and(|input| !input.trim().is_empty())
            && !self.has_recorded(&context.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{context_from_state, msg};
    use ctxweave_core::InitialState;

    fn state(input: &str) -> InitialState {
        InitialState {
            input: Some(input.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn appends_input_as_user_message() {
        let ctx = context_from_state(state("What's new?"))
            .with_messages(vec![msg::system("s1", "rules")]);
        let out = UserInputInjector::new().transform(&ctx).await.unwrap();

        assert_eq!(out.messages.len(), 2);
        assert!(out.messages[1].is_user());
        assert_eq!(out.messages[1].text(), "What's new?");
        assert_eq!(out.metadata.get("injection.user_input").unwrap(), 1);
    }

    #[tokio::test]
    async fn renders_template() {
        let ctx = context_from_state(state("cats"));
        let out = UserInputInjector::with_template("Question: {{input}}\nAnswer briefly.")
            .transform(&ctx)
            .await
            .unwrap();

        assert_eq!(out.messages[0].text(), "Question: cats\nAnswer briefly.");
    }

    #[tokio::test]
    async fn skips_when_history_already_ends_with_it() {
        let ctx = context_from_state(state("hi")).with_messages(vec![msg::user("u1", "hi")]);
        let out = UserInputInjector::new().transform(&ctx).await.unwrap();
        assert_eq!(out.messages.len(), 1);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let ctx = context_from_state(state("  "));
        let out = UserInputInjector::new().transform(&ctx).await.unwrap();
        assert!(out.messages.is_empty());
    }
}
