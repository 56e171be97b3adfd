//! Token counting capability.
//!
//! The pipeline never tokenizes text itself; stages that need token costs
//! receive a [`TokenCounter`]. Implementations may be exact (a tokenizer) or
//! approximate, and may be remote, so callers should keep the number of
//! calls bounded.

use async_trait::async_trait;

use crate::error::TokenCountError;
use crate::message::Message;

#[async_trait]
pub trait TokenCounter: Send + Sync {
    /// Estimate the token count of `text`.
    async fn count(&self, text: &str) -> Result<usize, TokenCountError>;

    /// Token cost of one message: its plain text only.
    async fn count_message(&self, message: &Message) -> Result<usize, TokenCountError> {
        self.count(&message.text()).await
    }

    /// Token cost of a batch, counted once over the concatenated text.
    async fn count_messages(&self, messages: &[Message]) -> Result<usize, TokenCountError> {
        let joined: String = messages.iter().map(|m| m.text()).collect();
        self.count(&joined).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CharCounter;

    #[async_trait]
    impl TokenCounter for CharCounter {
        async fn count(&self, text: &str) -> Result<usize, TokenCountError> {
            Ok(text.chars().count())
        }
    }

    #[tokio::test]
    async fn batch_counts_concatenated_text() {
        let messages = vec![Message::user("abc"), Message::assistant("de")];
        assert_eq!(CharCounter.count_messages(&messages).await.unwrap(), 5);
        assert_eq!(CharCounter.count_message(&messages[0]).await.unwrap(), 3);
    }
}
