//! Reference content-injection stages.
//!
//! Each one reads from the run's [`ctxweave_core::InitialState`], injects
//! once, and records `injection.<marker>` in the metadata.

pub mod history;
pub mod knowledge;
pub mod system_role;
pub mod user_input;

pub use history::HistoryInjector;
pub use knowledge::KnowledgeInjector;
pub use system_role::SystemRoleInjector;
pub use user_input::UserInputInjector;
