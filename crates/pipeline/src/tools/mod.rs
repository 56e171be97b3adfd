//! Tool-call/tool-response pairing.
//!
//! LLM APIs reject a tool response that does not directly follow the
//! assistant turn that requested it. [`ToolMessageReorder`] repairs the
//! sequence; [`validate_tool_pairing`] only reports.

pub mod reorder;
pub mod validator;

pub use reorder::{TOOL_REORDER_KEY, ToolMessageReorder, ToolReorderStats};
pub use validator::{ToolPairingReport, validate_tool_pairing};
