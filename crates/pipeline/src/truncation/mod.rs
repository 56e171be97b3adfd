//! Budget enforcement stages.
//!
//! - [`HistoryTruncator`]: keep the latest N messages and/or stay under a
//!   token ceiling, oldest dropped first
//! - [`TokenBasedTruncator`]: importance-ranked packing under a buffered
//!   budget, with partial truncation of one message

pub mod history;
pub mod importance;
pub mod token_budget;

pub use history::{HistoryTruncationStats, HistoryTruncator, HistoryTruncatorConfig, TruncationMethod};
pub use importance::ImportanceScorer;
pub use token_budget::{TokenBasedTruncator, TokenTruncationStats, TokenTruncatorConfig};

/// Metadata key written by [`HistoryTruncator`].
pub const HISTORY_TRUNCATION_KEY: &str = "historyTruncation";

/// Metadata key written by [`TokenBasedTruncator`].
pub const TOKEN_TRUNCATION_KEY: &str = "tokenTruncation";
