//! Importance scoring for budget-constrained selection.
//!
//! | Component | Rule |
//! |-----------|------|
//! | Base | 1 |
//! | Role | system 10, user 8, assistant 6, tool 4 |
//! | Length | 50 < chars < 500: +2, 500 ≤ chars < 1000: +1 |
//! | Capability | tool calls +3, images +2, reasoning +2 |
//! | Recency | 5 → 0 linearly over the most recent hour |

use chrono::{DateTime, Utc};
use ctxweave_core::{Message, Role};

const BASE_SCORE: f64 = 1.0;
const MAX_RECENCY_BONUS: f64 = 5.0;
const RECENCY_WINDOW_SECS: f64 = 3600.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportanceScorer;

impl ImportanceScorer {
    /// Score `message` relative to the reference time `now`.
    pub fn score(&self, message: &Message, now: DateTime<Utc>) -> f64 {
        BASE_SCORE
            + Self::role_weight(message.role())
            + Self::length_bonus(message.content().char_len())
            + Self::capability_bonus(message)
            + Self::recency_bonus(message.created_at(), now)
    }

    fn role_weight(role: Role) -> f64 {
        match role {
            Role::System => 10.0,
            Role::User => 8.0,
            Role::Assistant => 6.0,
            Role::Tool => 4.0,
        }
    }

    fn length_bonus(chars: usize) -> f64 {
        match chars {
            51..=499 => 2.0,
            500..=999 => 1.0,
            _ => 0.0,
        }
    }

    fn capability_bonus(message: &Message) -> f64 {
        let mut bonus = 0.0;
        if !message.tool_calls().is_empty() {
            bonus += 3.0;
        }
        if message.has_images() {
            bonus += 2.0;
        }
        if message.has_reasoning() {
            bonus += 2.0;
        }
        bonus
    }

    /// Messages without a timestamp get no bonus. Future timestamps count
    /// as brand new.
    fn recency_bonus(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let Some(created_at) = created_at else {
            return 0.0;
        };
        let age = (now - created_at).num_milliseconds().max(0) as f64 / 1000.0;
        if age >= RECENCY_WINDOW_SECS {
            return 0.0;
        }
        MAX_RECENCY_BONUS * (1.0 - age / RECENCY_WINDOW_SECS)
    }
}
