//! Injects the agent's system role.

use async_trait::async_trait;
use ctxweave_core::{PipelineContext, StageFailure};

use crate::processor::Processor;
use crate::provider::Provider;

/// Prepends the agent's role to the first system message, creating one at
/// the start when there is none.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRoleInjector;

#[async_trait]
impl Processor for SystemRoleInjector {
    fn name(&self) -> &str {
        "system_role_injector"
    }

    async fn transform(&self, context: &PipelineContext) -> Result<PipelineContext, StageFailure> {
        if !self.should_inject(context) {
            return Ok(context.clone());
        }

        let role = self.wrap_marked(context.initial_state.agent.system_role.trim());
        let mut messages = context.messages.clone();
        self.merge_into_system(&mut messages, &role, true);

        let mut next = context.with_messages(messages);
        self.record_injection(&mut next.metadata, 1);
        Ok(next)
    }
}

impl Provider for SystemRoleInjector {
    fn marker(&self) -> &str {
        "system_role"
    }

    fn should_inject(&self, context: &PipelineContext) -> bool {
        !context.initial_state.agent.system_role.trim().is_empty()
            && !self.has_injected(&context.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{context_from_state, msg};
    use ctxweave_core::{AgentProfile, InitialState, Message};

    fn state(role: &str, messages: Vec<Message>) -> InitialState {
        InitialState {
            messages,
            agent: AgentProfile {
                system_role: role.into(),
                model: None,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn creates_system_message_when_missing() {
        let ctx = context_from_state(state("You are terse.", vec![]))
            .with_messages(vec![msg::user("u1", "hi")]);
        let out = SystemRoleInjector.transform(&ctx).await.unwrap();

        assert_eq!(out.messages.len(), 2);
        assert!(out.messages[0].is_system());
        assert_eq!(
            out.messages[0].text(),
            "<system_role>\nYou are terse.\n</system_role>"
        );
    }

    #[tokio::test]
    async fn prepends_to_existing_system_message_once() {
        let ctx = context_from_state(state("You are terse.", vec![]))
            .with_messages(vec![msg::system("s1", "Rules."), msg::user("u1", "hi")]);

        let once = SystemRoleInjector.transform(&ctx).await.unwrap();
        assert_eq!(once.messages.len(), 2);
        assert!(once.messages[0].text().starts_with("<system_role>"));
        assert!(once.messages[0].text().ends_with("Rules."));

        let twice = SystemRoleInjector.transform(&once).await.unwrap();
        assert_eq!(twice.messages[0].text(), once.messages[0].text());
    }

    #[tokio::test]
    async fn blank_role_is_ignored() {
        let ctx = context_from_state(state("   ", vec![]));
        let out = SystemRoleInjector.transform(&ctx).await.unwrap();
        assert!(out.messages.is_empty());
    }
}
